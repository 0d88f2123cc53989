//! Test fixtures: a scratch deployment with its own system and user config
//! locations, so nothing outside the temp directory is ever consulted.

#![allow(dead_code)]

use ellire::macros::{Environment, MacroOverrides};
use ellire::{ConfigLocations, MacroResolver};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A deployment directory plus system and user config locations
pub struct Deployment {
    dir: TempDir,
}

impl Deployment {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("deploy")).unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::create_dir_all(dir.path().join("home/.ellire")).unwrap();
        Self { dir }
    }

    pub fn deploy_path(&self) -> PathBuf {
        self.dir.path().join("deploy")
    }

    pub fn system_config(&self) -> PathBuf {
        self.dir.path().join("etc/ellire.json")
    }

    pub fn user_dir(&self) -> PathBuf {
        self.dir.path().join("home/.ellire")
    }

    /// Write a file relative to the deploy path
    pub fn write(&self, rel: &str, contents: &str) -> &Self {
        let path = self.deploy_path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
        self
    }

    pub fn write_system(&self, contents: &str) -> &Self {
        fs::write(self.system_config(), contents).unwrap();
        self
    }

    pub fn write_user(&self, file_name: &str, contents: &str) -> &Self {
        fs::write(self.user_dir().join(file_name), contents).unwrap();
        self
    }

    /// Read a file relative to the deploy path
    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.deploy_path().join(rel)).unwrap()
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.deploy_path().join(rel).exists()
    }

    pub fn locations(&self) -> ConfigLocations {
        ConfigLocations::default()
            .with_system_file(self.system_config())
            .with_user_dir(self.user_dir())
    }

    pub fn resolver<'e>(&self, env: &'e dyn Environment, overrides: &[&str]) -> MacroResolver<'e> {
        MacroResolver::new(env)
            .with_locations(self.locations())
            .with_overrides(MacroOverrides::parse(overrides).unwrap())
            .with_working_dir(self.deploy_path())
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}
