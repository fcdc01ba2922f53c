//! Core POP3 types.

/// Mailbox statistics from STAT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStat {
    /// Number of messages in the maildrop.
    pub messages_no: u32,
    /// Total maildrop size in octets.
    pub mailbox_size: u64,
}
