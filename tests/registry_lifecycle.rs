use daemonctl::daemon::{
    CommandOptions, CommandTemplate, DaemonRegistry, DaemonSettings, DaemonState, OptionsUpdate,
};
use daemonctl::error::DaemonError;
use daemonctl::test_utils::{MockRemote, RemoteEvent, TemplateBuilder, WaitFailure};
use std::time::Duration;

/// Lifecycle behaviour of daemon handles and the registry, driven through
/// the in-memory remote.

fn osd_template() -> CommandTemplate {
    CommandTemplate::new(CommandOptions::new(["--foo"]))
}

#[tokio::test]
async fn test_running_after_restart_and_stopped_after_stop() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();

    let handle = registry
        .add_daemon(remote.clone(), "osd", "1", osd_template())
        .await
        .unwrap();
    assert!(handle.running());
    assert_eq!(handle.state(), DaemonState::Running);

    handle.stop(Duration::from_secs(5)).await.unwrap();
    assert!(!handle.running());

    handle.restart_with_args(vec!["--bar".to_string()]).await.unwrap();
    assert!(handle.running());

    handle.wait_for_exit().await.unwrap();
    assert!(!handle.running());

    handle.restart(Vec::new(), OptionsUpdate::new()).await.unwrap();
    assert!(handle.running());
    handle.reset();
    assert!(!handle.running());
}

#[tokio::test]
async fn test_stop_on_stopped_handle_is_noop() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();

    let handle = registry
        .add_daemon(remote.clone(), "mds", "a", osd_template())
        .await
        .unwrap();
    handle.stop(Duration::from_secs(5)).await.unwrap();
    let events_after_first_stop = remote.events();

    handle.stop(Duration::from_secs(5)).await.unwrap();
    assert!(!handle.running());
    assert_eq!(remote.events(), events_after_first_stop);
}

#[tokio::test]
async fn test_restart_extras_are_cumulative() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();
    let handle = registry
        .add_daemon(remote.clone(), "osd", "1", osd_template())
        .await
        .unwrap();

    handle
        .restart(vec!["-x".to_string()], OptionsUpdate::new())
        .await
        .unwrap();
    handle.restart(Vec::new(), OptionsUpdate::new()).await.unwrap();

    let last = remote.last_launch().unwrap();
    assert!(last.argv().contains(&"-x".to_string()));
    assert_eq!(handle.template().args, vec!["-x"]);
}

#[tokio::test]
async fn test_restart_merges_options_in_place() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();
    let handle = registry
        .add_daemon(remote.clone(), "rgw", "0", osd_template())
        .await
        .unwrap();

    handle
        .restart(
            Vec::new(),
            OptionsUpdate::new()
                .args(["radosgw", "--rgw-frontends=beast"])
                .env("CEPH_ARGS", "--debug-rgw 20"),
        )
        .await
        .unwrap();
    handle.restart(Vec::new(), OptionsUpdate::new()).await.unwrap();

    let last = remote.last_launch().unwrap();
    assert_eq!(last.options.args, vec!["radosgw", "--rgw-frontends=beast"]);
    assert_eq!(
        last.options.env.get("CEPH_ARGS").map(String::as_str),
        Some("--debug-rgw 20")
    );
}

#[tokio::test]
async fn test_restart_with_args_is_not_cumulative() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();
    let handle = registry
        .add_daemon(remote.clone(), "osd", "1", osd_template())
        .await
        .unwrap();

    handle
        .restart_with_args(vec!["-x".to_string()])
        .await
        .unwrap();
    assert!(remote.last_launch().unwrap().argv().contains(&"-x".to_string()));

    handle.restart(Vec::new(), OptionsUpdate::new()).await.unwrap();
    assert!(!remote.last_launch().unwrap().argv().contains(&"-x".to_string()));
}

#[tokio::test]
async fn test_restart_with_args_leaves_stored_template() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();
    let handle = registry
        .add_daemon(remote.clone(), "osd", "1", osd_template())
        .await
        .unwrap();

    handle
        .restart_with_args(vec!["--bar".to_string()])
        .await
        .unwrap();

    assert_eq!(
        remote.last_launch().unwrap().options.args,
        vec!["--foo", "--bar"]
    );
    assert_eq!(handle.template().options.args, vec!["--foo"]);
}

#[tokio::test]
async fn test_restart_stops_running_process_first() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();
    let handle = registry
        .add_daemon(remote.clone(), "mgr", "x", osd_template())
        .await
        .unwrap();

    handle.restart_with_args(Vec::new()).await.unwrap();

    let events = remote.events();
    assert_eq!(
        events,
        vec![
            RemoteEvent::Launched {
                process: 0,
                argv: vec!["--foo".to_string()],
            },
            RemoteEvent::StdinClosed { process: 0 },
            RemoteEvent::Waited {
                process: 0,
                timeout: Some(Duration::from_secs(300)),
            },
            RemoteEvent::Exited { process: 0 },
            RemoteEvent::Launched {
                process: 1,
                argv: vec!["--foo".to_string()],
            },
        ]
    );
}

#[tokio::test]
async fn test_failed_stop_aborts_restart() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();
    let handle = registry
        .add_daemon(remote.clone(), "osd", "2", osd_template())
        .await
        .unwrap();

    remote.fail_next_wait(WaitFailure::Failed(1));
    let err = handle
        .restart(vec!["-x".to_string()], OptionsUpdate::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DaemonError::CommandFailed { exit_code: 1, .. }));
    assert!(handle.running());
    assert!(handle.template().args.is_empty());
    assert_eq!(remote.launches().len(), 1);
}

#[tokio::test]
async fn test_add_daemon_twice_replaces_after_stop() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();

    registry
        .add_daemon(remote.clone(), "osd", "1", osd_template())
        .await
        .unwrap();
    registry
        .add_daemon(
            remote.clone(),
            "osd",
            1,
            TemplateBuilder::new("ceph-osd")
                .with_option_args(&["-f"])
                .with_args(&["-i", "1"])
                .with_env("CEPH_ARGS", "--debug-osd 20")
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(registry.iter_daemons_of_role("osd").count(), 1);
    assert_eq!(registry.len(), 1);

    let handle = registry.get_daemon("osd", "1").unwrap();
    assert!(handle.running());
    assert_eq!(handle.template().argv(), vec!["ceph-osd", "-f", "-i", "1"]);
    assert_eq!(
        remote.last_launch().unwrap().options.env.get("CEPH_ARGS").map(String::as_str),
        Some("--debug-osd 20")
    );

    let events = remote.events();
    let exited = events
        .iter()
        .position(|e| *e == RemoteEvent::Exited { process: 0 })
        .unwrap();
    let second_launch = events
        .iter()
        .position(|e| matches!(e, RemoteEvent::Launched { process: 1, .. }))
        .unwrap();
    assert!(exited < second_launch);
}

#[tokio::test]
async fn test_get_daemon_for_unknown_key_is_none() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();
    registry
        .add_daemon(remote.clone(), "osd", "1", osd_template())
        .await
        .unwrap();

    assert!(registry.get_daemon("osd", "2").is_none());
    assert!(registry.get_daemon("mon", "1").is_none());
    assert!(registry.get_daemon_mut("mon", "a").is_none());
}

#[tokio::test]
async fn test_iter_daemons_of_role() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();
    for id in 0..3 {
        registry
            .add_daemon(remote.clone(), "osd", id, osd_template())
            .await
            .unwrap();
    }
    registry
        .add_daemon(remote.clone(), "mon", "a", osd_template())
        .await
        .unwrap();

    let mut ids: Vec<&str> = registry
        .iter_daemons_of_role("osd")
        .map(|handle| handle.id())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["0", "1", "2"]);
    assert_eq!(registry.iter_daemons_of_role("client").count(), 0);
}

#[tokio::test]
async fn test_signal_writes_single_byte() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();
    let handle = registry
        .add_daemon(remote.clone(), "osd", "1", osd_template())
        .await
        .unwrap();

    handle.signal(1).await.unwrap();
    assert_eq!(remote.stdin_bytes(0), vec![0x01]);

    handle.signal(-1).await.unwrap();
    assert_eq!(remote.stdin_bytes(0), vec![0x01, 0xff]);
}

#[tokio::test]
async fn test_stop_timeout_then_reset() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();
    let handle = registry
        .add_daemon(remote.clone(), "mon", "a", osd_template())
        .await
        .unwrap();

    remote.fail_next_wait(WaitFailure::Timeout);
    let err = handle.stop(Duration::from_secs(5)).await.unwrap_err();

    assert!(matches!(
        err,
        DaemonError::Timeout { timeout, .. } if timeout == Duration::from_secs(5)
    ));
    assert!(handle.running());

    handle.reset();
    assert!(!handle.running());
}

#[tokio::test]
async fn test_wait_for_exit_failure_still_clears() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();
    let handle = registry
        .add_daemon(remote.clone(), "osd", "4", osd_template())
        .await
        .unwrap();

    remote.fail_next_wait(WaitFailure::ConnectionLost);
    let err = handle.wait_for_exit().await.unwrap_err();

    assert!(matches!(err, DaemonError::ConnectionLost(_)));
    assert!(!handle.running());
    assert!(remote.events().contains(&RemoteEvent::Waited {
        process: 0,
        timeout: None,
    }));
}

#[tokio::test]
async fn test_launch_failure_keeps_new_entry_stopped() {
    let remote = MockRemote::new();
    let mut registry = DaemonRegistry::default();

    remote.fail_next_launch();
    let err = registry
        .add_daemon(remote.clone(), "osd", "9", osd_template())
        .await
        .unwrap_err();

    assert!(matches!(err, DaemonError::SpawnError(_)));
    let handle = registry.get_daemon("osd", "9").unwrap();
    assert!(!handle.running());
}

#[tokio::test]
async fn test_registry_settings_reach_handles() {
    let remote = MockRemote::named("smithi001");
    let settings = DaemonSettings {
        stop_timeout: Duration::from_secs(42),
        ..DaemonSettings::default()
    };
    let mut registry = DaemonRegistry::new(settings);

    let handle = registry
        .add_daemon(remote.clone(), "osd", "1", osd_template())
        .await
        .unwrap();
    assert_eq!(handle.remote_name(), "smithi001");
    handle.stop_default().await.unwrap();

    assert!(remote.events().contains(&RemoteEvent::Waited {
        process: 0,
        timeout: Some(Duration::from_secs(42)),
    }));
}
