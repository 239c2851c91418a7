//! End-to-end runs of the migration driver against a scripted engine

use async_trait::async_trait;
use stack_migrate::error::{HandleKind, MigrateError, Phase, ProtocolError};
use stack_migrate::migration::{EventStream, Handle, MigrateRequest, MigrationEngine};
use stack_migrate::snapshot::read_snapshot;
use stack_migrate::stack::HclComponentExtractor;
use stack_migrate::types::{
    AppliedChange, ChangeDescription, ChangeKind, Diagnostic, MappingRegime, MigrationEvent,
    RawEntry, Severity, StreamFrame,
};
use stack_migrate::workspace::ResourceLister;
use stack_migrate::{MigrateConfig, MigrationDriver};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct FixedLister(Vec<&'static str>);

#[async_trait]
impl ResourceLister for FixedLister {
    async fn list_resources(&self, _location: &Path) -> stack_migrate::Result<Vec<String>> {
        Ok(self.0.iter().map(|s| s.to_string()).collect())
    }
}

enum Script {
    Frames(Vec<StreamFrame>),
    Hang,
}

struct ScriptedEngine {
    script: Mutex<Option<Script>>,
    requests: Mutex<Vec<(Option<BTreeMap<String, String>>, Option<BTreeMap<String, String>>)>>,
    log: Mutex<Vec<String>>,
    next: Mutex<i64>,
    fail_release: Option<HandleKind>,
}

impl ScriptedEngine {
    fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            requests: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
            next: Mutex::new(0),
            fail_release: None,
        }
    }

    fn failing_release(script: Script, kind: HandleKind) -> Self {
        Self {
            fail_release: Some(kind),
            ..Self::new(script)
        }
    }

    fn open(&self, kind: HandleKind) -> anyhow::Result<Handle> {
        let mut next = self.next.lock().unwrap();
        *next += 1;
        self.log.lock().unwrap().push(format!("open {kind}"));
        Ok(Handle(*next))
    }

    fn released(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.starts_with("release"))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MigrationEngine for ScriptedEngine {
    async fn open_state(&self, raw_state: &[u8]) -> anyhow::Result<Handle> {
        anyhow::ensure!(!raw_state.is_empty(), "empty state");
        self.open(HandleKind::State)
    }

    async fn open_config_bundle(&self, _dir: &Path) -> anyhow::Result<Handle> {
        self.open(HandleKind::ConfigBundle)
    }

    async fn open_stack_config(&self, _bundle: Handle, _path: &str) -> anyhow::Result<Handle> {
        self.open(HandleKind::StackConfig)
    }

    async fn open_lock_file(&self, _bundle: Handle, _path: &str) -> anyhow::Result<Handle> {
        self.open(HandleKind::LockFile)
    }

    async fn open_provider_cache(&self, _dir: &Path) -> anyhow::Result<Handle> {
        self.open(HandleKind::ProviderCache)
    }

    async fn release(&self, kind: HandleKind, _handle: Handle) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("release {kind}"));
        if self.fail_release == Some(kind) {
            anyhow::bail!("handle {kind} is not open");
        }
        Ok(())
    }

    async fn migrate(&self, request: MigrateRequest<'_>) -> anyhow::Result<EventStream> {
        self.requests.lock().unwrap().push((
            request.resource_address_map.cloned(),
            request.module_address_map.cloned(),
        ));
        match self.script.lock().unwrap().take() {
            Some(Script::Frames(frames)) => Ok(EventStream::from_frames(frames)),
            Some(Script::Hang) => Ok(EventStream::new(
                futures::stream::pending::<anyhow::Result<StreamFrame>>(),
            )),
            None => anyhow::bail!("migrate called twice"),
        }
    }
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(components: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path().join("workspace");
        let bundle = workspace.join("_stacks_generated");
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(workspace.join("terraform.tfstate"), br#"{"version":4}"#).unwrap();

        let mut hcl = String::new();
        for name in components {
            hcl.push_str(&format!(
                "component \"{name}\" {{\n  source = \"./{name}\"\n}}\n\n"
            ));
        }
        std::fs::write(bundle.join("components.tfcomponent.hcl"), hcl).unwrap();
        std::fs::write(
            bundle.join("providers.tfcomponent.hcl"),
            "required_providers {\n  aws = { source = \"hashicorp/aws\" }\n}\n",
        )
        .unwrap();

        Self { dir }
    }

    fn config(&self) -> MigrateConfig {
        let workspace = self.dir.path().join("workspace");
        MigrateConfig {
            stack_bundle_dir: workspace.join("_stacks_generated"),
            output_dir: workspace.join("stack_state"),
            workspace_dir: workspace,
            ..Default::default()
        }
    }

    fn driver(
        &self,
        resources: Vec<&'static str>,
    ) -> MigrationDriver<FixedLister, HclComponentExtractor> {
        MigrationDriver::new(self.config(), FixedLister(resources), HclComponentExtractor::new())
            .with_working_dir(self.dir.path())
    }

    fn output_path(&self) -> PathBuf {
        self.config().output_path()
    }
}

fn applied(key: &str, address: &str) -> StreamFrame {
    StreamFrame::Event(MigrationEvent::AppliedChange(AppliedChange {
        raw: vec![RawEntry::new(key, "type.test/Object", address.as_bytes().to_vec())],
        descriptions: vec![ChangeDescription::new(key, ChangeKind::ResourceInstance, address)],
    }))
}

const ALL_RELEASED: [&str; 5] = [
    "release provider cache",
    "release dependency lock file",
    "release stack configuration",
    "release config bundle",
    "release state",
];

#[tokio::test]
async fn test_flat_workspace_migrates_into_single_component() {
    let fixture = Fixture::new(&["app"]);
    let driver = fixture.driver(vec!["aws_instance.web", "aws_s3_bucket.logs"]);
    let engine = ScriptedEngine::new(Script::Frames(vec![
        applied("RSRCa", "component.app.aws_instance.web"),
        applied("RSRCb", "component.app.aws_s3_bucket.logs"),
        StreamFrame::Complete,
    ]));

    let report = driver.run(&engine, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.regime, MappingRegime::ResourceAddresses);
    assert_eq!(report.mapped_addresses, 2);
    assert_eq!(report.raw_entries, 2);
    assert_eq!(report.output_path, fixture.output_path());

    let requests = engine.requests.lock().unwrap().clone();
    let (resource_map, module_map) = &requests[0];
    assert!(module_map.is_none());
    assert_eq!(
        resource_map.as_ref().unwrap().get("aws_instance.web").map(String::as_str),
        Some("component.app")
    );

    let snapshot = read_snapshot(&fixture.output_path()).await.unwrap();
    assert_eq!(snapshot.format_version, 1);
    assert_eq!(
        snapshot.descriptions["RSRCb"].address,
        "component.app.aws_s3_bucket.logs"
    );
    assert_eq!(engine.released(), ALL_RELEASED);
}

#[tokio::test]
async fn test_modular_workspace_uses_module_map() {
    let fixture = Fixture::new(&["network", "compute"]);
    let driver = fixture.driver(vec![
        "module.network.aws_vpc.main",
        "module.compute[0].aws_instance.web",
        "module.compute.module.disk.aws_ebs_volume.data",
    ]);
    let engine = ScriptedEngine::new(Script::Frames(vec![StreamFrame::Complete]));

    let report = driver.run(&engine, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.regime, MappingRegime::ModuleNames);

    let requests = engine.requests.lock().unwrap().clone();
    let (resource_map, module_map) = &requests[0];
    assert!(resource_map.is_none());
    let module_map = module_map.as_ref().unwrap();
    assert_eq!(module_map.len(), 2);
    assert_eq!(module_map["compute"], "compute");

    let snapshot = read_snapshot(&fixture.output_path()).await.unwrap();
    assert!(snapshot.raw.is_empty());
    assert!(snapshot.descriptions.is_empty());
}

#[tokio::test]
async fn test_mixed_workspace_with_two_components_fails_in_mapping() {
    let fixture = Fixture::new(&["network", "compute"]);
    let driver = fixture.driver(vec!["module.network.aws_vpc.main", "aws_instance.web"]);
    let engine = ScriptedEngine::new(Script::Frames(vec![StreamFrame::Complete]));

    let err = driver.run(&engine, &CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.phase, Phase::Mapping);
    assert!(matches!(err.source, MigrateError::AmbiguousComponent { found: 2 }));
    assert!(engine.log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_module_component_mismatch_fails_in_mapping() {
    let fixture = Fixture::new(&["network", "storage"]);
    let driver = fixture.driver(vec!["module.network.aws_vpc.main", "module.compute.aws_instance.web"]);
    let engine = ScriptedEngine::new(Script::Frames(vec![StreamFrame::Complete]));

    let err = driver.run(&engine, &CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.phase, Phase::Mapping);
    assert!(matches!(err.source, MigrateError::AddressMismatch { .. }));
}

#[tokio::test]
async fn test_diagnostic_aborts_without_writing_snapshot() {
    let fixture = Fixture::new(&["app"]);
    let driver = fixture.driver(vec!["aws_instance.web"]);
    let engine = ScriptedEngine::new(Script::Frames(vec![
        applied("RSRCa", "component.app.aws_instance.web"),
        StreamFrame::Event(MigrationEvent::Diagnostic(Diagnostic {
            severity: Severity::Error,
            summary: "Unsupported resource".to_string(),
            detail: "aws_instance.web cannot be moved".to_string(),
        })),
        applied("RSRCb", "component.app.aws_instance.other"),
        StreamFrame::Complete,
    ]));

    let err = driver.run(&engine, &CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.phase, Phase::Streaming);
    assert!(matches!(
        err.source,
        MigrateError::Protocol(ProtocolError::Diagnostic { .. })
    ));
    assert!(!fixture.output_path().exists());
    assert_eq!(engine.released(), ALL_RELEASED);
}

#[tokio::test]
async fn test_release_failure_after_complete_stream_discards_snapshot() {
    let fixture = Fixture::new(&["app"]);
    let driver = fixture.driver(vec!["aws_instance.web"]);
    let engine = ScriptedEngine::failing_release(
        Script::Frames(vec![
            applied("RSRCa", "component.app.aws_instance.web"),
            StreamFrame::Complete,
        ]),
        HandleKind::StackConfig,
    );

    let err = driver.run(&engine, &CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.phase, Phase::Streaming);
    match &err.source {
        MigrateError::Protocol(ProtocolError::ReleaseFailed { handle, .. }) => {
            assert_eq!(*handle, HandleKind::StackConfig)
        }
        other => panic!("expected release failure, got {other}"),
    }
    assert_eq!(engine.released(), ALL_RELEASED);
    assert!(!fixture.output_path().exists());
}

#[tokio::test]
async fn test_truncated_stream_is_reported() {
    let fixture = Fixture::new(&["app"]);
    let driver = fixture.driver(vec!["aws_instance.web"]);
    let engine = ScriptedEngine::new(Script::Frames(vec![applied(
        "RSRCa",
        "component.app.aws_instance.web",
    )]));

    let err = driver.run(&engine, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        err.source,
        MigrateError::Protocol(ProtocolError::StreamTruncated)
    ));
    assert!(!fixture.output_path().exists());
}

#[tokio::test]
async fn test_cancellation_still_releases_handles() {
    let fixture = Fixture::new(&["app"]);
    let driver = fixture.driver(vec!["aws_instance.web"]);
    let engine = ScriptedEngine::new(Script::Hang);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = driver.run(&engine, &cancel).await.unwrap_err();

    assert_eq!(err.phase, Phase::Streaming);
    assert!(matches!(err.source, MigrateError::Cancelled { .. }));
    assert_eq!(engine.released(), ALL_RELEASED);
}

#[tokio::test]
async fn test_stream_timeout_is_cancellation() {
    let fixture = Fixture::new(&["app"]);
    let config = MigrateConfig {
        stream_timeout_secs: Some(1),
        ..fixture.config()
    };
    let driver = MigrationDriver::new(
        config,
        FixedLister(vec!["aws_instance.web"]),
        HclComponentExtractor::new(),
    )
    .with_working_dir(fixture.dir.path());
    let engine = ScriptedEngine::new(Script::Hang);

    let err = driver.run(&engine, &CancellationToken::new()).await.unwrap_err();

    match err.source {
        MigrateError::Cancelled { reason } => assert!(reason.contains("timed out")),
        other => panic!("expected cancellation, got {other}"),
    }
    assert_eq!(engine.released(), ALL_RELEASED);
}

#[tokio::test]
async fn test_missing_state_file_fails_session_setup() {
    let fixture = Fixture::new(&["app"]);
    std::fs::remove_file(fixture.dir.path().join("workspace/terraform.tfstate")).unwrap();
    let driver = fixture.driver(vec!["aws_instance.web"]);
    let engine = ScriptedEngine::new(Script::Frames(vec![StreamFrame::Complete]));

    let err = driver.run(&engine, &CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.phase, Phase::SessionSetup);
    assert!(matches!(err.source, MigrateError::Input { .. }));
    assert!(engine.log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_listing_fails_classification() {
    let fixture = Fixture::new(&["app"]);
    let driver = fixture.driver(vec![]);

    let err = driver.analyze().await.unwrap_err();

    assert_eq!(err.phase, Phase::Classification);
    assert!(err.to_string().starts_with("classification failed"));
}
