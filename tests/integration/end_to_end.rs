use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tplcache::blobstore::{BlobStore, LocalBlobStore};
use tplcache::core::{TplError, find_tpl_error, is_consistency_error};
use tplcache::models::{DeploymentJob, Instance, Release, Template};

use crate::common::{TestProject, count_entries, read_archive_entry};

#[tokio::test]
async fn test_router_release_end_to_end() {
    let project = TestProject::new().unwrap();
    let release = Release::from_yaml_file(&project.write_router_release().unwrap()).unwrap();
    let config = project.config();
    let compiler = config.build_compiler();
    let template = Template::new("router_conf");

    compiler.precompile(&release).await.unwrap();
    assert_eq!(project.blob_count(), 1);

    // Runtime packages are resolved by the first compile, not by precompile
    let err = compiler.find_packages(&template).await.unwrap_err();
    assert!(is_consistency_error(&err));

    let job = DeploymentJob::new("router", ["router_conf"]);
    let instance = Instance::new("router", 0).with_properties(json!({"router": {"port": 9090}}));
    let record = compiler.compile(&job, &instance).await.unwrap();
    assert_eq!(project.blob_count(), 2);

    let packages = compiler.find_packages(&template).await.unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].name, "router-pkg");
    assert_eq!(packages[0].version, "2.1");

    assert_eq!(compiler.find_rendered_archive(&job, &instance).await.unwrap(), record);

    let store = LocalBlobStore::new(config.blobstore_dir());
    let archive = store.get(&record.blob_id, &record.fingerprint).await.unwrap();
    assert_eq!(
        read_archive_entry(&archive, "router/config/router.conf").unwrap().as_deref(),
        Some("listen 9090\nname router/0\n")
    );

    // Unpacked sources and rendered archives are gone
    assert_eq!(count_entries(&config.work_dir().join("jobs")), 0);
    assert_eq!(count_entries(&config.work_dir().join("rendered")), 0);
}

#[tokio::test]
async fn test_property_defaults_apply_without_instance_values() {
    let project = TestProject::new().unwrap();
    let release = Release::from_yaml_file(&project.write_router_release().unwrap()).unwrap();
    let config = project.config();
    let compiler = config.build_compiler();
    compiler.precompile(&release).await.unwrap();

    let job = DeploymentJob::new("router", ["router_conf"]);
    let record = compiler.compile(&job, &Instance::new("router", 4)).await.unwrap();

    let store = LocalBlobStore::new(config.blobstore_dir());
    let archive = store.get(&record.blob_id, &record.fingerprint).await.unwrap();
    assert_eq!(
        read_archive_entry(&archive, "router/config/router.conf").unwrap().as_deref(),
        Some("listen 8080\nname router/4\n")
    );
}

#[tokio::test]
async fn test_corrupted_job_source_fails_compile_without_record() {
    let project = TestProject::new().unwrap();
    let release = Release::from_yaml_file(&project.write_router_release().unwrap()).unwrap();
    let config = project.config();
    let compiler = config.build_compiler();
    compiler.precompile(&release).await.unwrap();

    // Tamper with the only stored blob
    let blob = std::fs::read_dir(config.blobstore_dir()).unwrap().next().unwrap().unwrap().path();
    std::fs::write(&blob, b"tampered").unwrap();

    let job = DeploymentJob::new("router", ["router_conf"]);
    let instance = Instance::new("router", 0);
    let err = compiler.compile(&job, &instance).await.unwrap_err();
    assert!(matches!(find_tpl_error(&err), Some(TplError::FingerprintMismatch { .. })));
    assert!(format!("{err:#}").contains("Reading job router"));

    let err = compiler.find_rendered_archive(&job, &instance).await.unwrap_err();
    assert!(is_consistency_error(&err));
}

#[tokio::test]
async fn test_render_error_names_template() {
    let project = TestProject::new().unwrap();
    tplcache::test_utils::JobArchiveBuilder::new("router")
        .template("router.conf.tera", "config/router.conf", "{{ properties.missing }}")
        .write_to(&project.path().join("jobs").join("router.tgz"))
        .unwrap();
    let release_path = project
        .write_file(
            "release.yml",
            "name: edge\njobs:\n- name: router\n  tar_path: jobs/router.tgz\npackages: []\n",
        )
        .unwrap();
    let compiler = project.config().build_compiler();
    compiler.precompile(&Release::from_yaml_file(&release_path).unwrap()).await.unwrap();

    // Without declared templates the job answers to its own name
    let job = DeploymentJob::new("router", ["router"]);
    let err = compiler.compile(&job, &Instance::new("router", 0)).await.unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("properties.missing"));
    assert!(message.contains("router/router.conf.tera"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_compiles_for_different_instances() {
    let project = TestProject::new().unwrap();
    let release = Release::from_yaml_file(&project.write_router_release().unwrap()).unwrap();
    let compiler = Arc::new(project.config().build_compiler());
    compiler.precompile(&release).await.unwrap();

    let job = DeploymentJob::new("router", ["router_conf"]);
    let mut handles = Vec::new();
    for index in 0..5 {
        let compiler = Arc::clone(&compiler);
        let job = job.clone();
        handles.push(tokio::spawn(async move {
            let instance = Instance::new("router", index);
            compiler.compile(&job, &instance).await.map(|record| (instance, record))
        }));
    }

    let mut blob_ids = std::collections::HashSet::new();
    for handle in handles {
        let (instance, record) = handle.await.unwrap().unwrap();
        assert_eq!(compiler.find_rendered_archive(&job, &instance).await.unwrap(), record);
        blob_ids.insert(record.blob_id);
    }
    assert_eq!(blob_ids.len(), 5);
    assert_eq!(compiler.find_packages(&Template::new("router_conf")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancelled_compile_leaves_no_rendered_archive() {
    let project = TestProject::new().unwrap();
    tplcache::test_utils::JobArchiveBuilder::new("router")
        .template(
            "router.conf.tera",
            "config/router.conf",
            "{% for i in range(end=3000000) %}x{% endfor %}",
        )
        .write_to(&project.path().join("jobs").join("router.tgz"))
        .unwrap();
    let release_path = project
        .write_file(
            "release.yml",
            "name: edge\njobs:\n- name: router\n  tar_path: jobs/router.tgz\npackages: []\n",
        )
        .unwrap();
    let config = project.config();
    let compiler = config.build_compiler();
    compiler.precompile(&Release::from_yaml_file(&release_path).unwrap()).await.unwrap();

    let job = DeploymentJob::new("router", ["router"]);
    let instance = Instance::new("router", 0);
    let result =
        tokio::time::timeout(Duration::from_millis(150), compiler.compile(&job, &instance)).await;
    assert!(result.is_err(), "compile finished before the deadline");

    // The render keeps running after cancellation but must not leave its archive
    let rendered = config.work_dir().join("rendered");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(120);
    while count_entries(&rendered) > 0 {
        assert!(tokio::time::Instant::now() < deadline, "rendered archive leaked");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let err = compiler.find_rendered_archive(&job, &instance).await.unwrap_err();
    assert!(is_consistency_error(&err));
}
