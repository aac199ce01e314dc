//! Process-wide server counters.
//!
//! Updated only from the event-loop thread, so plain integers suffice.

use tracing::info;

#[derive(Debug, Default, Clone)]
pub struct ServerStats {
    /// Connections accepted since startup.
    pub total_connections: u64,
    /// Connections currently open.
    pub active_connections: u64,
    /// Requests read since startup.
    pub total_requests: u64,
    pub bytes_recv: u64,
    pub bytes_sent: u64,
}

impl ServerStats {
    pub fn log_summary(&self) {
        info!(
            total_connections = self.total_connections,
            active_connections = self.active_connections,
            total_requests = self.total_requests,
            bytes_recv = self.bytes_recv,
            bytes_sent = self.bytes_sent,
            "server statistics"
        );
    }
}
