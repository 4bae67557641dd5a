//! Canonical structured event names used across `remux-client`.

// Egress dispatch and backlog events.
pub const EGRESS_REGISTER: &str = "egress_register";
pub const EGRESS_UNREGISTER: &str = "egress_unregister";
pub const BACKLOG_ENQUEUE: &str = "backlog_enqueue";
pub const BACKLOG_REPLAY: &str = "backlog_replay";
pub const BACKLOG_DROP_OVERFLOW: &str = "backlog_drop_overflow";

// Connection lifecycle events.
pub const CONNECT_ATTEMPT: &str = "connect_attempt";
pub const CONNECT_OK: &str = "connect_ok";
pub const CONNECT_FAILED: &str = "connect_failed";
pub const LINK_READ_FAILED: &str = "link_read_failed";
pub const LINK_WRITE_FAILED: &str = "link_write_failed";
pub const LINK_SHUTDOWN: &str = "link_shutdown";
pub const RECONNECT_SCHEDULED: &str = "reconnect_scheduled";
pub const LINK_STOPPED: &str = "link_stopped";
pub const SOURCE_RELEASED: &str = "source_released";

// Channel registry events.
pub const CHANNEL_REGISTER: &str = "channel_register";
pub const CHANNEL_REUSE: &str = "channel_reuse";
pub const CHANNEL_LINK_ADDED: &str = "channel_link_added";
pub const CLIENT_STOP: &str = "client_stop";
pub const REPLY_DISCARDED: &str = "reply_discarded";
