//! Provides the administrative `metacluster` command.
//!
//! ```text
//! metacluster register <NAME> <max_tenant_groups=<NUM_GROUPS>|connection_string=<CONNECTION_STRING>> ...
//! metacluster remove [FORCE] <NAME>
//! metacluster list [BEGIN] [END] [LIMIT]
//! metacluster get <NAME> [JSON]
//! metacluster configure <NAME> <max_tenant_groups=<NUM_GROUPS>|connection_string=<CONNECTION_STRING>> ...
//! ```
//!
//! The command receives its arguments as pre-tokenized byte strings,
//! including the leading `metacluster` token. It returns a success
//! flag together with the text or JSON to show the administrator.

use bytes::Bytes;
use serde_json::{json, Value as JsonValue};

use std::fmt;

use crate::database::Database;
use crate::error::{
    FdbError, CLUSTER_ALREADY_EXISTS, CLUSTER_NOT_EMPTY, CLUSTER_NOT_FOUND, CLUSTER_NO_CAPACITY,
    INVALID_CONFIGURATION_PARAMETER, INVALID_NUMBER_OF_TENANT_GROUPS,
};
use crate::metacluster::{
    ClusterConfiguration, ClusterName, DataClusterEntry, MetaclusterManagement,
};
use crate::tenant::printable;
use crate::transaction::Transaction;

const CONFIGURE_OPTIONS_USAGE: &str = "\
max_tenant_groups sets the maximum number of tenant groups that can be assigned
to the named data cluster.
connection_string sets the connection string for the named data cluster.
";

const COMMAND_USAGE: &str = "\
metacluster <register|remove|list|get|configure> [ARGS]

view and manage a metacluster

Use `register' to add a data cluster to the metacluster.
";

/// Payload of a [`CommandResult`].
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutput {
    /// Plain text, one or more lines.
    Text(String),
    /// Structured output.
    Json(JsonValue),
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::Text(s) => f.write_str(s),
            CommandOutput::Json(v) => {
                f.write_str(&serde_json::to_string_pretty(v).map_err(|_| fmt::Error)?)
            }
        }
    }
}

/// Outcome of an administrative command.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandResult {
    success: bool,
    output: CommandOutput,
}

impl CommandResult {
    fn text(success: bool, s: impl Into<String>) -> CommandResult {
        CommandResult {
            success,
            output: CommandOutput::Text(s.into()),
        }
    }

    fn json(success: bool, v: JsonValue) -> CommandResult {
        CommandResult {
            success,
            output: CommandOutput::Json(v),
        }
    }

    /// Returns `true` if the command succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Get a reference to the [`CommandOutput`].
    pub fn output(&self) -> &CommandOutput {
        &self.output
    }

    /// Extract [`CommandOutput`] from [`CommandResult`].
    pub fn into_output(self) -> CommandOutput {
        self.output
    }
}

/// Run the `metacluster` command.
///
/// `tokens[0]` is the command name. Without a sub-command, or with an
/// unknown one, the usage is returned and the command succeeds.
pub async fn metacluster_command<D>(
    management: &MetaclusterManagement<D>,
    tokens: &[Bytes],
) -> CommandResult
where
    D: Database,
    <D::Transaction as Transaction>::Snapshot: Clone,
{
    match tokens.get(1).map(|t| &t[..]) {
        Some(b"register") => register_command(management, tokens).await,
        Some(b"remove") => remove_command(management, tokens).await,
        Some(b"list") => list_command(management, tokens).await,
        Some(b"get") => get_command(management, tokens).await,
        Some(b"configure") => configure_command(management, tokens).await,
        _ => CommandResult::text(true, COMMAND_USAGE),
    }
}

/// Argument hints for a partially typed `metacluster` command.
///
/// `in_argument` is `true` while the cursor is still inside the last
/// token.
pub fn metacluster_hints(tokens: &[Bytes], in_argument: bool) -> Vec<&'static str> {
    const CONFIGURE_HINTS: [&str; 2] = [
        "<NAME>",
        "<max_tenant_groups=<NUM_GROUPS>|connection_string=<CONNECTION_STRING>>",
    ];

    let skip = |opts: &[&'static str], n: usize| opts.iter().skip(n).copied().collect::<Vec<_>>();

    match tokens.len() {
        0 => return Vec::new(),
        1 => return vec!["<register|remove|list|get|configure>", "[ARGS]"],
        _ => {}
    }

    let n = tokens.len() - 2;

    match &tokens[1][..] {
        b"register" | b"configure" => skip(&CONFIGURE_HINTS, n.min(1)),
        b"remove" if tokens.len() < 4 => {
            let opts = ["[FORCE]", "<NAME>"];
            if tokens.len() == 2 {
                skip(&opts, 0)
            } else if (in_argument || tokens[2].len() == b"FORCE".len())
                && b"FORCE".starts_with(&tokens[2][..])
            {
                skip(&opts, 1)
            } else {
                Vec::new()
            }
        }
        b"list" if tokens.len() < 5 => skip(&["[BEGIN]", "[END]", "[LIMIT]"], n),
        b"get" if tokens.len() < 4 => skip(&["<NAME>", "[JSON]"], n),
        _ => Vec::new(),
    }
}

async fn register_command<D>(management: &MetaclusterManagement<D>, tokens: &[Bytes]) -> CommandResult
where
    D: Database,
    <D::Transaction as Transaction>::Snapshot: Clone,
{
    if tokens.len() < 4 {
        return CommandResult::text(
            false,
            format!(
                "Usage: metacluster register <NAME> <max_tenant_groups=<NUM_GROUPS>|\n\
                 connection_string=<CONNECTION_STRING>> ...\n\n\
                 Adds a data cluster with the given connection string to a metacluster.\n\
                 NAME is used to identify the cluster in future commands.\n{}",
                CONFIGURE_OPTIONS_USAGE
            ),
        );
    }

    let name = ClusterName::from(tokens[2].clone());

    let config = match parse_configuration(&tokens[3..]) {
        Ok(config) => config,
        Err(msg) => return CommandResult::text(false, msg),
    };

    let connection_string = match config.connection_string() {
        Some(connection_string) => connection_string.clone(),
        None => {
            return CommandResult::text(
                false,
                "ERROR: connection_string must be configured when registering a cluster.",
            )
        }
    };

    let entry = DataClusterEntry::new(config.capacity().unwrap_or_default());

    match management
        .register_cluster(name.clone(), connection_string, entry)
        .await
    {
        Ok(()) => CommandResult::text(true, format!("The cluster `{}' has been added", name)),
        Err(e) => CommandResult::text(false, error_text(e, &name)),
    }
}

async fn remove_command<D>(management: &MetaclusterManagement<D>, tokens: &[Bytes]) -> CommandResult
where
    D: Database,
    <D::Transaction as Transaction>::Snapshot: Clone,
{
    if tokens.len() < 3 || tokens.len() > 4 || (tokens.len() == 4 && &tokens[2][..] != b"FORCE") {
        return CommandResult::text(
            false,
            "Usage: metacluster remove [FORCE] <NAME>\n\n\
             Removes the specified data cluster from a metacluster.\n\
             If FORCE is specified, then the cluster will be detached even if it has\n\
             tenants assigned to it.\n",
        );
    }

    let name = ClusterName::from(tokens[tokens.len() - 1].clone());
    let force = tokens.len() == 4;

    match management.remove_cluster(name.clone(), force).await {
        Ok(()) => CommandResult::text(true, format!("The cluster `{}' has been removed", name)),
        Err(e) => CommandResult::text(false, error_text(e, &name)),
    }
}

async fn list_command<D>(management: &MetaclusterManagement<D>, tokens: &[Bytes]) -> CommandResult
where
    D: Database,
    <D::Transaction as Transaction>::Snapshot: Clone,
{
    if tokens.len() > 5 {
        return CommandResult::text(
            false,
            "Usage: metacluster list [BEGIN] [END] [LIMIT]\n\n\
             Lists the data clusters in a metacluster.\n\
             Only cluster names in the range BEGIN - END will be printed.\n\
             An optional LIMIT can be specified to limit the number of results (default 100).\n",
        );
    }

    let begin = tokens
        .get(2)
        .cloned()
        .unwrap_or_else(Bytes::new);
    let end = tokens
        .get(3)
        .cloned()
        .unwrap_or_else(|| Bytes::from_static(&b"\xFF"[..]));

    let limit = match tokens.get(4) {
        Some(token) => match parse_non_negative(&token[..]) {
            Some(limit) => Some(limit),
            None => {
                return CommandResult::text(
                    false,
                    format!("ERROR: invalid limit {}", printable(&token[..])),
                )
            }
        },
        None => None,
    };

    let clusters = match management
        .list_clusters(ClusterName::from(begin), ClusterName::from(end), limit)
        .await
    {
        Ok(clusters) => clusters,
        Err(e) => return CommandResult::text(false, format!("ERROR: {}", e)),
    };

    if clusters.is_empty() {
        return CommandResult::text(
            true,
            if tokens.len() == 2 {
                "The metacluster has no registered data clusters"
            } else {
                "The metacluster has no registered data clusters in the specified range"
            },
        );
    }

    CommandResult::text(
        true,
        clusters
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("  {}. {}", i + 1, name))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

async fn get_command<D>(management: &MetaclusterManagement<D>, tokens: &[Bytes]) -> CommandResult
where
    D: Database,
    <D::Transaction as Transaction>::Snapshot: Clone,
{
    if tokens.len() < 3 || tokens.len() > 4 || (tokens.len() == 4 && &tokens[3][..] != b"JSON") {
        return CommandResult::text(
            false,
            "Usage: metacluster get <NAME> [JSON]\n\n\
             Prints metadata associated with the given data cluster.\n\
             If JSON is specified, then the output will be in JSON format.\n",
        );
    }

    let name = ClusterName::from(tokens[2].clone());
    let use_json = tokens.len() == 4;

    match (management.get_cluster(name.clone()).await, use_json) {
        (Ok(metadata), true) => CommandResult::json(
            true,
            json!({
                "type": "success",
                "cluster": metadata.to_json(),
            }),
        ),
        (Ok(metadata), false) => CommandResult::text(
            true,
            format!(
                "  connection string: {}\n  tenant group capacity: {}\n  allocated tenant groups: {}",
                printable(&metadata.connection_string()[..]),
                metadata.entry().capacity().num_tenant_groups(),
                metadata.entry().allocated().num_tenant_groups()
            ),
        ),
        (Err(e), true) => CommandResult::json(
            false,
            json!({
                "type": "error",
                "error": e.description(),
            }),
        ),
        (Err(e), false) => CommandResult::text(false, error_text(e, &name)),
    }
}

async fn configure_command<D>(management: &MetaclusterManagement<D>, tokens: &[Bytes]) -> CommandResult
where
    D: Database,
    <D::Transaction as Transaction>::Snapshot: Clone,
{
    if tokens.len() < 4 {
        return CommandResult::text(
            false,
            format!(
                "Usage: metacluster configure <NAME> <max_tenant_groups=<NUM_GROUPS>|\n\
                 connection_string=<CONNECTION_STRING>> ...\n\n\
                 Updates the configuration of the metacluster.\n{}",
                CONFIGURE_OPTIONS_USAGE
            ),
        );
    }

    let name = ClusterName::from(tokens[2].clone());

    let config = match parse_configuration(&tokens[3..]) {
        Ok(config) => config,
        Err(msg) => return CommandResult::text(false, msg),
    };

    match management.configure_cluster(name.clone(), &config).await {
        Ok(_) => CommandResult::text(
            true,
            format!("The configuration for cluster `{}' has been updated", name),
        ),
        Err(e) => CommandResult::text(false, error_text(e, &name)),
    }
}

// Parse `name=value` tokens, naming the offending token on failure.
fn parse_configuration(tokens: &[Bytes]) -> Result<ClusterConfiguration, String> {
    ClusterConfiguration::parse(tokens).map_err(|e| {
        let token = tokens
            .iter()
            .find(|t| ClusterConfiguration::parse(std::slice::from_ref(*t)).is_err())
            .map(|t| printable(&t[..]))
            .unwrap_or_default();

        match e.code() {
            INVALID_NUMBER_OF_TENANT_GROUPS => {
                format!("ERROR: invalid number of tenant groups `{}'", token)
            }
            INVALID_CONFIGURATION_PARAMETER => {
                format!("ERROR: unrecognized configuration parameter `{}'", token)
            }
            _ => format!("ERROR: {}", e),
        }
    })
}

fn parse_non_negative(b: &[u8]) -> Option<i32> {
    if b.is_empty() || !b.iter().all(|x| x.is_ascii_digit()) {
        return None;
    }
    std::str::from_utf8(b).ok()?.parse::<i32>().ok()
}

// Name the cluster and the violated invariant.
fn error_text(e: FdbError, name: &ClusterName) -> String {
    match e.code() {
        CLUSTER_NOT_FOUND => format!("ERROR: cluster `{}' does not exist", name),
        CLUSTER_ALREADY_EXISTS => format!("ERROR: cluster `{}' already exists", name),
        CLUSTER_NOT_EMPTY => format!(
            "ERROR: cluster `{}' has allocated tenant groups, use FORCE to remove it",
            name
        ),
        CLUSTER_NO_CAPACITY => format!(
            "ERROR: cluster `{}' has more tenant groups allocated than the requested capacity",
            name
        ),
        _ => format!("ERROR: {}", e),
    }
}
