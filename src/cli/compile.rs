//! `tplcache compile <deployment-job.yml> <instance.yml>`

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::common::{OutputFormat, load_yaml, print_record};
use crate::compiler::TemplatesCompiler;
use crate::models::{DeploymentJob, Instance};

/// Render a deployment job's templates for one instance and record the archive.
///
/// ```yaml
/// # deployment job
/// name: router
/// templates:
/// - name: router_conf
/// ```
///
/// ```yaml
/// # instance
/// job_name: router
/// index: 0
/// properties:
///   port: 9090
/// ```
#[derive(Args, Debug)]
pub struct CompileCommand {
    /// Deployment job (YAML)
    #[arg(value_name = "JOB")]
    pub job: PathBuf,

    /// Deployment instance (YAML)
    #[arg(value_name = "INSTANCE")]
    pub instance: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl CompileCommand {
    pub async fn execute(self, compiler: &TemplatesCompiler) -> Result<()> {
        let job: DeploymentJob = load_yaml(&self.job, "deployment job").await?;
        let instance: Instance = load_yaml(&self.instance, "instance").await?;

        let record = compiler.compile(&job, &instance).await?;
        print_record(&record, self.format)
    }
}
