//! Integration tests for the runtime client against an in-process shim.
//!
//! Covered scenarios:
//! - create persists the spec, tracks the ID, and hands stdio to the caller
//! - a duplicate create for a tracked ID is rejected
//! - a failed create leaves no bundle behind and does not track the ID
//! - stale bundle contents are cleaned before a create
//! - signal addresses the init process and is serialized per ID
//! - process exit wakes waiters and untracks the ID

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use berth_common::error::BerthError;
use berth_common::spec::RuntimeSpec;
use berth_runtime::client::{Client, ContainerRuntime};
use berth_runtime::container::StdioPipes;
use berth_runtime::error::RuntimeError;
use berth_runtime::options::{CreateOption, NoPivotRootOption, RuntimeOption};
use berth_runtime::shim::{
    CreateContainerRequest, CreateContainerResponse, ShimApi, ShimError, SignalRequest,
};

#[derive(Default)]
struct FakeShim {
    fail_create: Mutex<Option<ShimError>>,
    creates: Mutex<Vec<CreateContainerRequest>>,
    signals: Mutex<Vec<SignalRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeShim {
    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
    }

    fn leave(&self) {
        let _ = self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ShimApi for FakeShim {
    fn create_container(
        &self,
        request: &CreateContainerRequest,
    ) -> Result<CreateContainerResponse, ShimError> {
        self.enter();
        assert!(request.bundle_path.join("config.json").is_file());
        self.creates.lock().unwrap().push(request.clone());
        let result = self
            .fail_create
            .lock()
            .unwrap()
            .clone()
            .map_or(Ok(CreateContainerResponse { pid: 4242 }), Err);
        self.leave();
        result
    }

    fn signal(&self, request: &SignalRequest) -> Result<(), ShimError> {
        self.enter();
        self.signals.lock().unwrap().push(request.clone());
        self.leave();
        Ok(())
    }
}

fn spec() -> RuntimeSpec {
    let mut spec = RuntimeSpec::default();
    spec.process.args = vec!["/bin/sh".into()];
    spec.process.cwd = "/".into();
    spec
}

fn no_stdio(_: &StdioPipes) -> berth_common::error::Result<()> {
    Ok(())
}

fn client(state: &Path, shim: Arc<FakeShim>) -> Client {
    Client::new(state.to_path_buf(), shim)
}

#[test]
fn create_persists_spec_and_tracks_container() {
    let state = tempfile::tempdir().unwrap();
    let shim = Arc::new(FakeShim::default());
    let client = client(state.path(), Arc::clone(&shim));
    let seen = Mutex::new(None::<StdioPipes>);
    let attach = |pipes: &StdioPipes| -> berth_common::error::Result<()> {
        *seen.lock().unwrap() = Some(pipes.clone());
        Ok(())
    };
    let options: Vec<Box<dyn CreateOption>> = vec![
        Box::new(RuntimeOption {
            path: "/usr/bin/runc".into(),
            args: vec!["--systemd-cgroup".into()],
        }),
        Box::new(NoPivotRootOption(true)),
    ];

    let pid = client
        .create("c1", "", Path::new("/ckpt"), &spec(), &attach, &options)
        .unwrap();
    assert_eq!(pid, 4242);

    let bundle = state.path().join("c1");
    let persisted: RuntimeSpec =
        serde_json::from_str(&std::fs::read_to_string(bundle.join("config.json")).unwrap())
            .unwrap();
    assert_eq!(persisted, spec());

    let creates = shim.creates.lock().unwrap();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].bundle_path, bundle);
    assert_eq!(creates[0].runtime, "/usr/bin/runc");
    assert_eq!(creates[0].runtime_args, vec!["--systemd-cgroup"]);
    assert!(creates[0].no_pivot_root);
    assert_eq!(creates[0].checkpoint_dir, PathBuf::from("/ckpt"));

    let pipes = seen.lock().unwrap().clone().expect("stdio callback invoked");
    assert_eq!(pipes.stdin, bundle.join("init-stdin"));
    assert!(client.is_active("c1"));
    assert_eq!(client.get("c1").unwrap().pid, Some(4242));
}

#[test]
fn duplicate_create_is_already_active() {
    let state = tempfile::tempdir().unwrap();
    let shim = Arc::new(FakeShim::default());
    let client = client(state.path(), Arc::clone(&shim));

    let _ = client
        .create("c1", "", Path::new(""), &spec(), &no_stdio, &[])
        .unwrap();
    let err = client
        .create("c1", "", Path::new(""), &spec(), &no_stdio, &[])
        .unwrap_err();

    assert!(matches!(err, RuntimeError::Local(BerthError::AlreadyActive { .. })));
    assert_eq!(shim.creates.lock().unwrap().len(), 1);
}

#[test]
fn failed_create_leaves_no_bundle() {
    let state = tempfile::tempdir().unwrap();
    let shim = Arc::new(FakeShim::default());
    *shim.fail_create.lock().unwrap() = Some(ShimError::untyped(
        "exec: \"/app\": stat /app: no such file or directory",
    ));
    let client = client(state.path(), Arc::clone(&shim));

    let err = client
        .create("c1", "", Path::new(""), &spec(), &no_stdio, &[])
        .unwrap_err();

    assert!(err.as_shim().is_some());
    assert!(!state.path().join("c1").exists());
    assert!(!client.is_active("c1"));
    assert!(client.exit_waiter("c1").is_none());

    *shim.fail_create.lock().unwrap() = None;
    let _ = client
        .create("c1", "", Path::new(""), &spec(), &no_stdio, &[])
        .unwrap();
    assert!(client.is_active("c1"));
}

#[test]
fn failing_stdio_callback_aborts_create_and_cleans_up() {
    let state = tempfile::tempdir().unwrap();
    let shim = Arc::new(FakeShim::default());
    let client = client(state.path(), Arc::clone(&shim));
    let attach = |_: &StdioPipes| -> berth_common::error::Result<()> {
        Err(BerthError::validation("no log driver"))
    };

    let err = client
        .create("c1", "", Path::new(""), &spec(), &attach, &[])
        .unwrap_err();

    assert!(matches!(err, RuntimeError::Local(BerthError::Validation { .. })));
    assert!(shim.creates.lock().unwrap().is_empty());
    assert!(!state.path().join("c1").exists());
}

#[test]
fn stale_bundle_is_cleaned_before_create() {
    let state = tempfile::tempdir().unwrap();
    let stale = state.path().join("c1");
    std::fs::create_dir_all(&stale).unwrap();
    std::fs::write(stale.join("leftover"), "x").unwrap();
    let client = client(state.path(), Arc::new(FakeShim::default()));

    let _ = client
        .create("c1", "", Path::new(""), &spec(), &no_stdio, &[])
        .unwrap();

    assert!(!stale.join("leftover").exists());
    assert!(stale.join("config.json").exists());
}

#[test]
fn signal_targets_init_process() {
    let state = tempfile::tempdir().unwrap();
    let shim = Arc::new(FakeShim::default());
    let client = client(state.path(), Arc::clone(&shim));

    client.signal("c1", 15).unwrap();

    let signals = shim.signals.lock().unwrap();
    assert_eq!(
        signals[0],
        SignalRequest {
            id: "c1".into(),
            pid: "init".into(),
            signal: 15,
        }
    );
}

#[test]
fn negative_signal_is_rejected() {
    let state = tempfile::tempdir().unwrap();
    let client = client(state.path(), Arc::new(FakeShim::default()));
    let err = client.signal("c1", -9).unwrap_err();
    assert!(matches!(err, RuntimeError::Local(BerthError::Validation { .. })));
}

#[test]
fn create_and_signal_on_one_id_never_overlap() {
    let state = tempfile::tempdir().unwrap();
    let shim = Arc::new(FakeShim {
        delay: Some(Duration::from_millis(20)),
        ..FakeShim::default()
    });
    let client = Arc::new(client(state.path(), Arc::clone(&shim)));

    let creator = {
        let client = Arc::clone(&client);
        thread::spawn(move || {
            let _ = client
                .create("c1", "", Path::new(""), &spec(), &no_stdio, &[])
                .unwrap();
        })
    };
    let signallers: Vec<_> = (0..4)
        .map(|_| {
            let client = Arc::clone(&client);
            thread::spawn(move || client.signal("c1", 9).unwrap())
        })
        .collect();
    creator.join().unwrap();
    for s in signallers {
        s.join().unwrap();
    }

    assert_eq!(shim.max_in_flight.load(Ordering::SeqCst), 1);
}

#[test]
fn process_exit_wakes_waiters_and_untracks() {
    let state = tempfile::tempdir().unwrap();
    let client = Arc::new(client(state.path(), Arc::new(FakeShim::default())));
    let _ = client
        .create("c1", "", Path::new(""), &spec(), &no_stdio, &[])
        .unwrap();

    let waiter = client.exit_waiter("c1").expect("tracked container has a waiter");
    let handle = {
        let waiter = waiter.clone();
        thread::spawn(move || waiter.wait())
    };
    client.process_exited("c1").unwrap();
    handle.join().unwrap();

    assert!(waiter.is_closed());
    assert!(!client.is_active("c1"));
    assert!(!state.path().join("c1").exists());

    let _ = client
        .create("c1", "", Path::new(""), &spec(), &no_stdio, &[])
        .unwrap();
    let fresh = client.exit_waiter("c1").unwrap();
    assert!(!fresh.is_closed());
}
