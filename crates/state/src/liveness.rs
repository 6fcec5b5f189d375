//! Process liveness checks for `running` records

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Whether a process with this id exists on the current host
#[must_use]
pub fn process_alive(pid: u32) -> bool {
    let mut system = System::new();
    let process_pid = Pid::from_u32(pid);
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[process_pid]),
        false,
        ProcessRefreshKind::nothing(),
    );
    system.process(process_pid).is_some()
}

/// Name of the current host, if it can be determined
#[must_use]
pub fn host_name() -> Option<String> {
    System::host_name()
}
