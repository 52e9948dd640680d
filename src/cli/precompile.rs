//! `tplcache precompile <release.yml>`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::compiler::TemplatesCompiler;
use crate::models::Release;

/// Store job sources and register templates and packages for a release.
///
/// The release manifest lists jobs with their source tarballs and the release
/// packages; relative tarball paths are resolved against the manifest:
///
/// ```yaml
/// name: edge
/// version: "1"
/// jobs:
/// - name: router
///   version: "1"
///   fingerprint: 3f2a
///   tar_path: jobs/router.tgz
///   templates: [router_conf]
/// packages:
/// - name: router-pkg
/// - name: common-pkg
/// ```
#[derive(Args, Debug)]
pub struct PrecompileCommand {
    /// Release manifest (YAML)
    #[arg(value_name = "RELEASE")]
    pub release: PathBuf,
}

impl PrecompileCommand {
    pub async fn execute(self, compiler: &TemplatesCompiler) -> Result<()> {
        let release = Release::from_yaml_file(&self.release)?;
        compiler.precompile(&release).await?;

        println!(
            "{} Precompiled release {}/{} ({} jobs)",
            "✓".green(),
            release.name,
            release.version,
            release.jobs.len()
        );
        Ok(())
    }
}
