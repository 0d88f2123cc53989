//! End-to-end resolution and generation tests

mod fixtures;

use ellire::generate::FileOutcome;
use ellire::macros::{ConfigLayer, ExpandError, ResolveError};
use ellire::{Pipeline, PipelineError};
use fixtures::Deployment;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

fn no_env() -> BTreeMap<String, String> {
    BTreeMap::new()
}

fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_missing_macro_still_generates() {
    let deployment = Deployment::new();
    deployment.write("app.conf.template", "listen=@port@\n");
    let env = no_env();

    let outcome = Pipeline::new(deployment.resolver(&env, &[]))
        .reprocess()
        .unwrap();

    assert_eq!(outcome.run.raw.profile, "dev");
    assert_eq!(outcome.run.processed.unresolved, BTreeSet::from(["port".to_string()]));
    assert_eq!(
        outcome.report.missing_macros(),
        BTreeSet::from(["port".to_string()])
    );
    assert_eq!(
        outcome.report.outcomes[Path::new("app.conf.template")],
        FileOutcome::Changed
    );
    assert_eq!(deployment.read("app.conf"), "listen=@port@\n");
}

#[test]
fn test_undefined_name_inside_macro_value_is_reported() {
    let deployment = Deployment::new();
    deployment
        .write("ellire.json", r#"{"globals": {"url": "http://@host@/"}}"#)
        .write("client.cfg.template", "url=@url@\n");
    let env = no_env();

    let outcome = Pipeline::new(deployment.resolver(&env, &[]))
        .reprocess()
        .unwrap();

    assert_eq!(deployment.read("client.cfg"), "url=http://@host@/\n");
    assert_eq!(outcome.run.processed.unresolved, BTreeSet::from(["host".to_string()]));
    assert_eq!(
        outcome.report.missing_macros(),
        BTreeSet::from(["host".to_string()])
    );
}

#[test]
fn test_user_config_switches_local_extension() {
    let deployment = Deployment::new();
    deployment
        .write_user("ellire.json", r#"{"globals": {"config_extension": "yml"}}"#)
        .write("ellire.yml", "globals:\n  port: 8080\n")
        .write("ellire.json", r#"{"globals": {"port": "1"}}"#)
        .write("app.conf.template", "port=@port@ ext=@config_extension@\n");
    let env = no_env();

    let outcome = Pipeline::new(deployment.resolver(&env, &[]))
        .reprocess()
        .unwrap();

    assert_eq!(outcome.run.raw.config_extension, "yml");
    assert_eq!(deployment.read("app.conf"), "port=8080 ext=yml\n");
}

#[test]
fn test_second_run_skips_everything() {
    let deployment = Deployment::new();
    deployment
        .write("ellire.json", r#"{"globals": {"host": "db.local", "port": 5432}}"#)
        .write("app.conf.template", "db=@host@:@port@\n")
        .write("nested/dir/worker.ini.template", "[worker]\nhost=@host@\n");
    let env = no_env();
    let pipeline = Pipeline::new(deployment.resolver(&env, &[]));

    let first = pipeline.reprocess().unwrap();
    assert_eq!(first.report.changed_count(), 2);
    assert_eq!(deployment.read("app.conf"), "db=db.local:5432\n");
    assert_eq!(deployment.read("nested/dir/worker.ini"), "[worker]\nhost=db.local\n");

    let second = pipeline.reprocess().unwrap();
    assert_eq!(second.report.skipped_count(), 2);
    assert_eq!(second.report.changed_count(), 0);
}

#[test]
fn test_cycle_aborts_before_writing() {
    let deployment = Deployment::new();
    deployment
        .write("ellire.json", r#"{"globals": {"a": "@b@", "b": "x-@a@"}}"#)
        .write("app.conf.template", "value=@a@\n");
    let env = no_env();

    let err = Pipeline::new(deployment.resolver(&env, &[]))
        .reprocess()
        .unwrap_err();

    assert_eq!(err.exit_code(), 2);
    match err {
        PipelineError::Resolve(ResolveError::Expand(ExpandError::Circular(cycle))) => {
            let path = cycle.cycle();
            assert_eq!(path.first(), path.last());
            assert!(path.contains(&"a".to_string()));
            assert!(path.contains(&"b".to_string()));
        }
        other => panic!("expected circular reference, got {:?}", other),
    }
    assert!(!deployment.exists("app.conf"));
}

#[test]
fn test_env_profile_selects_prod_section() {
    let deployment = Deployment::new();
    deployment
        .write(
            "ellire.json",
            r#"{"globals": {"host": "localhost"}, "prod": {"host": "db.example.com"}}"#,
        )
        .write("app.conf.template", "host=@host@\nprofile=@profile@\n");
    let env = env(&[("ELLIRE_PROFILE", "prod")]);

    Pipeline::new(deployment.resolver(&env, &[]))
        .reprocess()
        .unwrap();

    assert_eq!(deployment.read("app.conf"), "host=db.example.com\nprofile=prod\n");
}

#[test]
fn test_full_precedence_across_formats() {
    let deployment = Deployment::new();
    deployment
        .write_system(
            r#"{"globals": {"config_extension": "yml", "a": "system", "b": "system", "c": "system", "d": "system", "e": "system"}}"#,
        )
        .write_user("ellire.yml", "globals:\n  b: user\n")
        .write("ellire.yml", "globals:\n  c: local\ndev:\n  d: local-dev\n")
        .write(".ellire-instance.yml", "e: instance\nf: instance\n")
        .write("out.txt.template", "@a@ @b@ @c@ @d@ @e@ @f@ @g@\n");
    let env = env(&[("ELLIRE_F", "env"), ("ELLIRE_G", "env")]);

    let outcome = Pipeline::new(deployment.resolver(&env, &["g=cli"]))
        .reprocess()
        .unwrap();

    assert_eq!(
        deployment.read("out.txt"),
        "system user local local-dev instance env cli\n"
    );

    let raw = &outcome.run.raw.macros;
    assert_eq!(raw.origin("a"), Some(ConfigLayer::SystemGlobal));
    assert_eq!(raw.origin("b"), Some(ConfigLayer::UserGlobal));
    assert_eq!(raw.origin("d"), Some(ConfigLayer::LocalProfile));
    assert_eq!(raw.origin("e"), Some(ConfigLayer::Instance));
    assert_eq!(raw.origin("f"), Some(ConfigLayer::Environment));
    assert_eq!(raw.origin("g"), Some(ConfigLayer::Override));
    assert_eq!(outcome.run.raw.config_files.len(), 4);
}

#[test]
fn test_template_only_macro_seeded_from_env() {
    let deployment = Deployment::new();
    deployment
        .write("ellire.json", r#"{"globals": {"url": "https://@domain@/api"}}"#)
        .write("client.cfg.template", "endpoint=@url@\ntoken=@api_token@\n");
    let env = env(&[("ELLIRE_DOMAIN", "example.org"), ("ELLIRE_API_TOKEN", "s3cret")]);

    let outcome = Pipeline::new(deployment.resolver(&env, &[]))
        .reprocess()
        .unwrap();

    assert_eq!(
        deployment.read("client.cfg"),
        "endpoint=https://example.org/api\ntoken=s3cret\n"
    );
    assert!(outcome.run.processed.unresolved.is_empty());
    assert_eq!(
        outcome.run.processed.env_vars_used.get("api_token").map(String::as_str),
        Some("ELLIRE_API_TOKEN")
    );
}

#[test]
fn test_excluded_directories_and_custom_extension() {
    let deployment = Deployment::new();
    deployment
        .write(
            "ellire.json",
            r#"{"globals": {"dist_file_extension": "dist", "template_exclude_paths": ["cache", "vendor/lib"], "name": "app"}}"#,
        )
        .write("config.php.dist", "name=@name@")
        .write("cache/skip.php.dist", "@name@")
        .write("vendor/lib/skip.php.dist", "@name@")
        .write("ignored.template", "@name@");

    let env = no_env();
    let outcome = Pipeline::new(deployment.resolver(&env, &[]))
        .reprocess()
        .unwrap();

    assert_eq!(outcome.run.templates, vec![PathBuf::from("config.php.dist")]);
    assert_eq!(deployment.read("config.php"), "name=app");
    assert!(!deployment.exists("cache/skip.php"));
    assert!(!deployment.exists("ignored"));
}

#[test]
fn test_malformed_config_is_fatal() {
    let deployment = Deployment::new();
    deployment
        .write("ellire.json", "{ \"globals\": ")
        .write("app.conf.template", "x");
    let env = no_env();

    let err = Pipeline::new(deployment.resolver(&env, &[]))
        .reprocess()
        .unwrap_err();

    assert_eq!(err.exit_code(), 1);
    assert!(!deployment.exists("app.conf"));
}

#[cfg(unix)]
#[test]
fn test_generated_files_are_read_only_by_default() {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let deployment = Deployment::new();
    deployment.write("run.sh.template", "#!/bin/sh\necho @profile@\n");
    fs::set_permissions(
        deployment.deploy_path().join("run.sh.template"),
        fs::Permissions::from_mode(0o755),
    )
    .unwrap();
    let env = no_env();

    Pipeline::new(deployment.resolver(&env, &[]))
        .reprocess()
        .unwrap();

    let mode = fs::metadata(deployment.deploy_path().join("run.sh"))
        .unwrap()
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o555);

    Pipeline::new(deployment.resolver(&env, &["generated_files_writable=true", "profile=prod"]))
        .reprocess()
        .unwrap();
    let mode = fs::metadata(deployment.deploy_path().join("run.sh"))
        .unwrap()
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o755);
    assert_eq!(deployment.read("run.sh"), "#!/bin/sh\necho prod\n");
}
