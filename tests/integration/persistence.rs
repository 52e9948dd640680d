use tplcache::models::{DeploymentJob, Instance, Release, Template};

use crate::common::TestProject;

#[tokio::test]
async fn test_state_is_shared_across_compiler_instances() {
    let project = TestProject::new().unwrap();
    let release = Release::from_yaml_file(&project.write_router_release().unwrap()).unwrap();
    let config = project.config();

    config.build_compiler().precompile(&release).await.unwrap();
    assert_eq!(project.blob_count(), 1);

    // A fresh compiler sees the stored job source and does not upload it again
    config.build_compiler().precompile(&release).await.unwrap();
    assert_eq!(project.blob_count(), 1);

    let job = DeploymentJob::new("router", ["router_conf"]);
    let instance = Instance::new("router", 1);
    let record = config.build_compiler().compile(&job, &instance).await.unwrap();

    let reader = config.build_compiler();
    assert_eq!(reader.find_rendered_archive(&job, &instance).await.unwrap(), record);
    let packages = reader.find_packages(&Template::new("router_conf")).await.unwrap();
    assert_eq!(packages.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["router-pkg"]);

    for file in ["jobs.json", "template_to_job.json", "runtime_packages.json", "templates.json"] {
        assert!(config.state_dir.join(file).exists(), "missing {file}");
    }
}

#[tokio::test]
async fn test_recompile_replaces_persisted_record() {
    let project = TestProject::new().unwrap();
    let release = Release::from_yaml_file(&project.write_router_release().unwrap()).unwrap();
    let config = project.config();
    config.build_compiler().precompile(&release).await.unwrap();

    let job = DeploymentJob::new("router", ["router_conf"]);
    let instance = Instance::new("router", 0);
    let first = config.build_compiler().compile(&job, &instance).await.unwrap();
    let second = config.build_compiler().compile(&job, &instance).await.unwrap();
    assert_ne!(first.blob_id, second.blob_id);

    let found = config.build_compiler().find_rendered_archive(&job, &instance).await.unwrap();
    assert_eq!(found, second);
}
