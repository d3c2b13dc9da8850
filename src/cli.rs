//! Command-line surface.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::output::OutputFormat;

const LONG_ABOUT: &str = "vcon (short for \"VM Control\") performs vSphere management tasks

vcon makes requests to vSphere in groups, clustered together via a timeout";

#[derive(Parser, Debug)]
#[command(name = "vcon", version, about = "vcon performs vSphere management tasks", long_about = LONG_ABOUT)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection settings and switches shared by every verb.
///
/// Unset values fall back to the config file, then to defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// config file (default is $HOME/.vcon.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// vSphere datacenter name
    #[arg(long, env = "VCON_DATACENTER", global = true)]
    pub datacenter: Option<String>,

    /// vSphere datastore name
    #[arg(long, env = "VCON_DATASTORE", global = true)]
    pub datastore: Option<String>,

    /// prompts for password when password is not provided
    #[arg(
        long = "prompt-for-password",
        env = "VCON_PROMPT_FOR_PASSWORD",
        global = true,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub prompt_for_password: Option<bool>,

    /// vSphere user password
    #[arg(short = 'p', long, env = "VCON_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// timeout for operations, in seconds
    #[arg(short = 't', long, env = "VCON_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// vSphere user name
    #[arg(short = 'u', long, env = "VCON_USERNAME", global = true)]
    pub username: Option<String>,

    /// causes vcon to emit progress messages
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// DNS name or IP address of the vSphere instance
    #[arg(long, env = "VCON_VSPHERE", global = true)]
    pub vsphere: Option<String>,

    /// skip TLS certificate verification
    #[arg(
        long,
        env = "VCON_INSECURE",
        global = true,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub insecure: Option<bool>,

    /// format of VM and snapshot reports
    #[arg(long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub output: OutputFormat,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// path to the VM, relative to the datacenter's VM folder
    pub target: String,

    /// TARGET parameter is the target VM's uuid
    #[arg(long = "targetIsRef")]
    pub target_is_ref: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clones a template or VM
    Clone {
        source: String,

        /// JSON block containing VM configuration
        #[arg(short = 'c', long)]
        configuration: Option<String>,

        /// destination folder for new VM
        #[arg(short = 'd', long, default_value = "")]
        destination: String,

        /// name of new VM; if no name is specified, one will be generated.
        #[arg(short = 'n', long)]
        name: Option<String>,

        /// determines whether the VM will be started after cloning
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        on: bool,

        /// resource pool name for new VM
        #[arg(long = "resourcepool", default_value = "")]
        resource_pool: String,
    },

    /// Updates the configuration of a VM
    ///
    /// CONFIGURATION is a JSON document ({"cpus", "memory", "network"}), a
    /// path to a file holding one, or read from stdin when omitted.
    Configure {
        #[command(flatten)]
        target: TargetArgs,

        configuration: Option<String>,
    },

    /// Destroys a VM
    ///
    /// A running VM cannot be destroyed; --force shuts it down first.
    Destroy {
        #[command(flatten)]
        target: TargetArgs,

        /// will stop a running VM in order to destroy
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// Retrieves information about a VM
    Info {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Creates a '.vcon.yaml' configuration file in your home directory
    Init,

    /// Appends notes to a VM
    ///
    /// NOTES may be a path to a file or a literal string; when omitted, vcon
    /// reads stdin until EOF. Notes are appended to existing notes, separated
    /// by a blank line, unless --overwrite is set.
    Note {
        #[command(flatten)]
        target: TargetArgs,

        notes: Option<String>,

        /// determines whether to replace notes instead of appending
        #[arg(long)]
        overwrite: bool,
    },

    /// Sets the power state of a VM
    Power {
        #[arg(value_enum)]
        state: PowerState,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Moves and/or renames the TARGET vm
    #[command(visible_aliases = ["rename", "move"])]
    Relocate {
        #[command(flatten)]
        target: TargetArgs,

        /// destination folder for VM; if no destination is specified, the VM will not move
        #[arg(short = 'd', long)]
        destination: Option<String>,

        /// name of VM; if no name is specified, the name will not change
        #[arg(short = 'n', long)]
        name: Option<String>,
    },

    /// Manipulates snapshots for a VM
    #[command(subcommand)]
    Snapshot(SnapshotCommand),

    /// Tests a connection to vSphere
    Test,

    /// Report the version of the `vcon` application
    Version,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Creates a snapshot of a VM
    Create {
        #[command(flatten)]
        target: TargetArgs,

        /// name of new snapshot; if no name is specified, one will be generated.
        #[arg(short = 'n', long)]
        name: Option<String>,
    },

    /// Lists all snapshots of a VM
    List {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Removes one or all of the snapshots on a VM
    ///
    /// Without SNAPSHOT every snapshot is removed. SNAPSHOT is a name or a
    /// '/'-separated path of names, or the snapshot id with --snapshotIsRef.
    Remove {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        snapshot: SnapshotArgs,
    },

    /// Reverts a VM to a snapshot
    ///
    /// Without SNAPSHOT the VM reverts to its current snapshot.
    Revert {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        snapshot: SnapshotArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct SnapshotArgs {
    pub snapshot: Option<String>,

    /// SNAPSHOT parameter is the snapshot's uuid
    #[arg(long = "snapshotIsRef")]
    pub snapshot_is_ref: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
    Suspend,
}
