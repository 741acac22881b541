use crate::daemon::{CommandTemplate, DaemonHandle, DaemonSettings, OptionsUpdate};
use crate::error::{DaemonError, Result};
use crate::remote::Remote;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Daemon handles indexed by role, then by id.
///
/// At most one handle exists per (role, id). Entries are only ever replaced,
/// never removed behind the caller's back.
#[derive(Debug, Default)]
pub struct DaemonRegistry {
    daemons: HashMap<String, HashMap<String, DaemonHandle>>,
    settings: DaemonSettings,
}

impl DaemonRegistry {
    pub fn new(settings: DaemonSettings) -> Self {
        Self {
            daemons: HashMap::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &DaemonSettings {
        &self.settings
    }

    /// Register a daemon at (role, id) and launch it.
    ///
    /// An existing entry is stopped first. If that stop fails the old entry
    /// stays registered as it was and [`DaemonError::ReplacementAborted`]
    /// is returned. If launching the new daemon fails, the new (stopped)
    /// handle stays registered and the launch error is returned.
    pub async fn add_daemon(
        &mut self,
        remote: Arc<dyn Remote>,
        role: &str,
        id: impl ToString,
        template: CommandTemplate,
    ) -> Result<&mut DaemonHandle> {
        let id = id.to_string();
        let role_daemons = self.daemons.entry(role.to_string()).or_default();

        if let Some(existing) = role_daemons.get_mut(&id) {
            info!("Replacing daemon {}.{}", role, id);
            if let Err(e) = existing.stop_default().await {
                error!("Failed to stop daemon {}.{} for replacement: {}", role, id, e);
                return Err(DaemonError::ReplacementAborted {
                    role: role.to_string(),
                    id,
                    source: Box::new(e),
                });
            }
        }

        let handle = DaemonHandle::new(remote, role, &id, template, &self.settings);
        let handle = role_daemons.entry(id).insert_entry(handle).into_mut();
        handle.restart(Vec::new(), OptionsUpdate::new()).await?;
        Ok(handle)
    }

    pub fn get_daemon(&self, role: &str, id: impl ToString) -> Option<&DaemonHandle> {
        self.daemons.get(role)?.get(&id.to_string())
    }

    pub fn get_daemon_mut(&mut self, role: &str, id: impl ToString) -> Option<&mut DaemonHandle> {
        self.daemons.get_mut(role)?.get_mut(&id.to_string())
    }

    /// Handles registered under `role`, in no particular order.
    pub fn iter_daemons_of_role<'a>(
        &'a self,
        role: &str,
    ) -> impl Iterator<Item = &'a DaemonHandle> {
        self.daemons.get(role).into_iter().flat_map(|ids| ids.values())
    }

    pub fn iter_daemons_of_role_mut<'a>(
        &'a mut self,
        role: &str,
    ) -> impl Iterator<Item = &'a mut DaemonHandle> {
        self.daemons
            .get_mut(role)
            .into_iter()
            .flat_map(|ids| ids.values_mut())
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.daemons.keys().map(String::as_str)
    }

    pub fn running_daemons(&self) -> impl Iterator<Item = &DaemonHandle> {
        self.daemons
            .values()
            .flat_map(|ids| ids.values())
            .filter(|handle| handle.running())
    }

    pub fn len(&self) -> usize {
        self.daemons.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every running daemon, carrying on past failures. Returns the
    /// failures keyed by (role, id).
    pub async fn stop_all(&mut self, timeout: Duration) -> Vec<(String, String, DaemonError)> {
        let mut failures = Vec::new();

        for handle in self.daemons.values_mut().flat_map(|ids| ids.values_mut()) {
            if !handle.running() {
                continue;
            }
            if let Err(e) = handle.stop(timeout).await {
                error!("Failed to stop daemon {}.{}: {}", handle.role(), handle.id(), e);
                failures.push((handle.role().to_string(), handle.id().to_string(), e));
            }
        }

        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::CommandOptions;
    use crate::test_utils::{MockRemote, RemoteEvent, WaitFailure};

    fn osd_template(id: &str) -> CommandTemplate {
        CommandTemplate::new(CommandOptions::new(["ceph-osd", "-f", "-i", id]))
    }

    #[tokio::test]
    async fn test_add_daemon_launches() {
        let remote = MockRemote::new();
        let mut registry = DaemonRegistry::default();

        let handle = registry
            .add_daemon(remote.clone(), "osd", 1, osd_template("1"))
            .await
            .unwrap();
        assert!(handle.running());
        assert_eq!(handle.id(), "1");

        assert_eq!(remote.launched_argv(), vec![vec!["ceph-osd", "-f", "-i", "1"]]);
        assert!(registry.get_daemon("osd", "1").is_some());
        assert!(registry.get_daemon("osd", 1).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_get_daemon_absent() {
        let registry = DaemonRegistry::default();
        assert!(registry.get_daemon("mds", "a").is_none());
        assert!(registry.is_empty());
        assert_eq!(registry.iter_daemons_of_role("mds").count(), 0);
    }

    #[tokio::test]
    async fn test_failed_replacement_keeps_old_entry() {
        let remote = MockRemote::new();
        let mut registry = DaemonRegistry::default();
        registry
            .add_daemon(remote.clone(), "mon", "a", osd_template("a"))
            .await
            .unwrap();

        remote.fail_next_wait(WaitFailure::Crashed);
        let err = registry
            .add_daemon(remote.clone(), "mon", "a", osd_template("b"))
            .await
            .unwrap_err();

        assert!(matches!(err, DaemonError::ReplacementAborted { .. }));
        assert!(err.is_wait_failure());

        let old = registry.get_daemon("mon", "a").unwrap();
        assert!(old.running());
        assert_eq!(old.template().argv(), vec!["ceph-osd", "-f", "-i", "a"]);
        assert_eq!(remote.launched_argv().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_all_collects_failures() {
        let remote = MockRemote::new();
        let mut registry = DaemonRegistry::default();
        for id in ["0", "1"] {
            registry
                .add_daemon(remote.clone(), "osd", id, osd_template(id))
                .await
                .unwrap();
        }

        remote.fail_next_wait(WaitFailure::Timeout);
        let failures = registry.stop_all(Duration::from_secs(1)).await;

        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].2, DaemonError::Timeout { .. }));
        assert_eq!(registry.running_daemons().count(), 1);

        let closes = remote
            .events()
            .into_iter()
            .filter(|e| matches!(e, RemoteEvent::StdinClosed { .. }))
            .count();
        assert_eq!(closes, 2);
    }

    #[tokio::test]
    async fn test_roles_and_mutable_iteration() {
        let remote = MockRemote::new();
        let mut registry = DaemonRegistry::default();
        registry
            .add_daemon(remote.clone(), "osd", "0", osd_template("0"))
            .await
            .unwrap();
        registry
            .add_daemon(remote.clone(), "mgr", "x", osd_template("x"))
            .await
            .unwrap();

        let mut roles: Vec<&str> = registry.roles().collect();
        roles.sort();
        assert_eq!(roles, vec!["mgr", "osd"]);

        for handle in registry.iter_daemons_of_role_mut("osd") {
            handle.reset();
        }
        assert_eq!(registry.running_daemons().count(), 1);
    }
}
