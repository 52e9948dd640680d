//! Read-only lookups: `find-packages` and `find-rendered`.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::common::{OutputFormat, load_yaml, print_json, print_record};
use crate::compiler::TemplatesCompiler;
use crate::models::{DeploymentJob, Instance, Template};

/// Show the runtime packages resolved for the job defining a template.
#[derive(Args, Debug)]
pub struct FindPackagesCommand {
    /// Template name as used by deployment jobs
    #[arg(value_name = "TEMPLATE")]
    pub template: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl FindPackagesCommand {
    pub async fn execute(self, compiler: &TemplatesCompiler) -> Result<()> {
        let packages = compiler.find_packages(&Template::new(self.template)).await?;

        match self.format {
            OutputFormat::Json => print_json(&packages),
            OutputFormat::Text => {
                for pkg in &packages {
                    if pkg.version.is_empty() {
                        println!("{}", pkg.name);
                    } else {
                        println!("{} {}", pkg.name, pkg.version);
                    }
                }
                Ok(())
            }
        }
    }
}

/// Show the recorded rendered archive for a deployment job and instance.
#[derive(Args, Debug)]
pub struct FindRenderedCommand {
    /// Deployment job (YAML)
    #[arg(value_name = "JOB")]
    pub job: PathBuf,

    /// Deployment instance (YAML)
    #[arg(value_name = "INSTANCE")]
    pub instance: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl FindRenderedCommand {
    pub async fn execute(self, compiler: &TemplatesCompiler) -> Result<()> {
        let job: DeploymentJob = load_yaml(&self.job, "deployment job").await?;
        let instance: Instance = load_yaml(&self.instance, "instance").await?;

        let record = compiler.find_rendered_archive(&job, &instance).await?;
        print_record(&record, self.format)
    }
}
