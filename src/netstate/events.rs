//! Hook argument types and the registry bundle fired by [`super::Network`]
//! (spec component F / §3.3 "Callback registries").
//!
//! Every event kind the source enumerates gets one `Registry<Args>`
//! instance rather than a bespoke array (spec §9 design note). Ordering is
//! registration order; a hook that destructively consumes its subject
//! returns [`HookResult::StopIteration`](crate::hooks::HookResult) so the
//! registry halts rather than handing later hooks a stale reference.

use crate::clock::Timestamp;
use crate::hooks::Registry;

/// Relative channel-age indicator computed on join/burst merge (spec §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelAge {
    /// The incoming channel timestamp is older: ours was wiped.
    Older,
    /// Equal timestamps: modes/bans/topic were merged.
    Equal,
    /// The incoming timestamp is newer: the burst data was ignored.
    Newer,
}

#[derive(Debug, Clone)]
pub struct NewUserArgs {
    pub nick: String,
}

#[derive(Debug, Clone)]
pub struct DelUserArgs {
    pub nick: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct JoinArgs {
    pub nick: String,
    pub channel: String,
    pub rel_age: RelAge,
}

#[derive(Debug, Clone)]
pub struct PartArgs {
    pub nick: String,
    pub channel: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KickArgs {
    pub kicker: String,
    pub victim: String,
    pub channel: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct NickChangeArgs {
    pub old_nick: String,
    pub new_nick: String,
    pub when: Timestamp,
}

#[derive(Debug, Clone)]
pub struct NewChannelArgs {
    pub channel: String,
}

#[derive(Debug, Clone)]
pub struct DelChannelArgs {
    pub channel: String,
}

#[derive(Debug, Clone)]
pub struct AuthArgs {
    pub nick: String,
    pub handle: String,
}

#[derive(Debug, Clone)]
pub struct HandleRenameArgs {
    pub old_handle: String,
    pub new_handle: String,
}

#[derive(Debug, Clone)]
pub struct UnregArgs {
    pub handle: String,
}

#[derive(Debug, Clone)]
pub struct AllowAuthArgs {
    pub nick: String,
    pub handle: String,
}

#[derive(Debug, Clone)]
pub struct FailPwArgs {
    pub nick: String,
    pub handle: String,
}

#[derive(Debug, Clone)]
pub struct HandleMergeArgs {
    pub from_handle: String,
    pub to_handle: String,
}

#[derive(Debug, Clone)]
pub struct XqueryArgs {
    pub from_server: String,
    pub request: String,
}

#[derive(Debug, Clone)]
pub struct ServerLinkArgs {
    pub server: String,
}

#[derive(Debug, Clone)]
pub struct ExitArgs {
    pub server: String,
}

/// Every hook registry the network state engine fan-outs to (spec §3.3
/// component F). `conf_reload` lives on [`crate::config::Config`] and
/// `saxdb_named` on [`crate::saxdb::SaxDb`] — both are themselves registries
/// of the same shape, just keyed differently, so they aren't duplicated
/// here.
#[derive(Default)]
pub struct NetworkHooks {
    pub new_user: Registry<NewUserArgs>,
    pub del_user: Registry<DelUserArgs>,
    pub join: Registry<JoinArgs>,
    pub part: Registry<PartArgs>,
    pub kick: Registry<KickArgs>,
    pub nick_change: Registry<NickChangeArgs>,
    pub new_channel: Registry<NewChannelArgs>,
    pub del_channel: Registry<DelChannelArgs>,
    pub auth: Registry<AuthArgs>,
    pub handle_rename: Registry<HandleRenameArgs>,
    pub unreg: Registry<UnregArgs>,
    pub allowauth: Registry<AllowAuthArgs>,
    pub failpw: Registry<FailPwArgs>,
    pub handle_merge: Registry<HandleMergeArgs>,
    pub xquery: Registry<XqueryArgs>,
    pub server_link: Registry<ServerLinkArgs>,
    pub exit: Registry<ExitArgs>,
}
