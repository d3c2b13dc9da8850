//! Verb handlers.
//!
//! Each invocation connects once, runs one verb, and logs out again.

use std::io::{self, Write};
use std::path::Path;

use tracing::{info, warn};
use vcon_vsphere::snapshot::report_snapshot;
use vcon_vsphere::types::{VirtualMachineConfiguration, VmProperty};
use vcon_vsphere::vsphere::VsphereClient;
use vcon_vsphere::{Platform, Session, VirtualMachine};

use crate::cli::{Cli, Command, PowerState, SnapshotArgs, SnapshotCommand, TargetArgs};
use crate::config::{self, Settings};
use crate::error::{AppError, AppResult};
use crate::input::read_text;
use crate::naming::{generate_name, NameContext, SNAPSHOT_NAME_TEMPLATE, VM_NAME_TEMPLATE};
use crate::output;

pub async fn run(cli: Cli) -> AppResult<()> {
    let Cli { global, command } = cli;

    match &command {
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::Init => return init(global.config.as_deref()),
        Command::Relocate { name, destination, .. }
            if given(name).is_none() && given(destination).is_none() =>
        {
            info!("Neither a name nor a destination was given; nothing to do");
            return Ok(());
        }
        _ => {}
    }

    let mut settings = Settings::resolve(&global, config::load(global.config.as_deref())?);
    settings.check()?;
    settings.ensure_password()?;

    info!("Connecting to {} as {}", settings.host, settings.username);
    let session =
        Session::<VsphereClient>::connect(&settings.vsphere_config(), settings.session_options())
            .await?;

    let ctx = NameContext::new(settings.username.as_str());
    let mut stdout = io::stdout();
    let result = execute(&session, command, &settings, &ctx, &mut stdout).await;

    if let Err(e) = session.close().await {
        warn!("Failed to log out of vSphere: {e}");
    }
    result
}

/// Run one verb against an established session.
pub async fn execute<P: Platform>(
    session: &Session<P>,
    command: Command,
    settings: &Settings,
    ctx: &NameContext,
    out: &mut dyn Write,
) -> AppResult<()> {
    let resolver = session.resolver();
    let vms = session.vms();

    match command {
        Command::Clone { source, configuration, destination, name, on, resource_pool } => {
            // Parse before anything is created on the host.
            let patch: Option<VirtualMachineConfiguration> =
                configuration.as_deref().map(serde_json::from_str).transpose()?;

            let template = resolver.find_vm(&source, false, &[]).await?;
            let name = generate_name(name.as_deref(), VM_NAME_TEMPLATE, ctx);
            let vm = vms.clone(&template, &name, &destination, &resource_pool).await?;
            info!("Cloned '{source}' to '{name}' ({})", vm.reference);

            if let Some(patch) = patch {
                let fresh = resolver.find_vm(&vm.reference.value, true, &[VmProperty::Network]);
                let configured = match fresh.await {
                    Ok(fresh) => vms.configure(&fresh, &patch).await.map(|_| ()),
                    Err(e) => Err(e),
                };
                if let Err(e) = configured {
                    warn!("Failed to configure the new VM: {e}");
                }
            }
            if on {
                let ip = vms.ensure_on(&vm).await?;
                info!("'{name}' is running at {ip}");
            }

            output::write(out, &vms.report(&vm).await, settings.output)
        }

        Command::Configure { target, configuration } => {
            let text = read_text(configuration.as_deref())?;
            let patch: VirtualMachineConfiguration = serde_json::from_str(&text)?;

            let vm = find(session, &target, &[VmProperty::Network]).await?;
            vms.require_powered_off(&vm, "Cannot adjust configuration of a VM that is not powered off")
                .await?;

            let outcome = vms.configure(&vm, &patch).await?;
            if let Some(report) = outcome.network.filter(|r| !r.is_complete()) {
                warn!(
                    "Moved {} of {} adapters from '{}' to '{}'",
                    report.rewired.len(),
                    report.rewired.len() + report.failed.len(),
                    report.from,
                    report.to
                );
            }
            Ok(())
        }

        Command::Destroy { target, force } => {
            let vm = find(session, &target, &[]).await?;
            if force {
                vms.ensure_off(&vm).await?;
            }
            vms.destroy(&vm).await?;
            if settings.verbose {
                writeln!(out, "OK")?;
            }
            Ok(())
        }

        Command::Info { target } => {
            let vm = find(session, &target, &[VmProperty::Network, VmProperty::Summary]).await?;
            output::write(out, &vms.report(&vm).await, settings.output)
        }

        Command::Note { target, notes, overwrite } => {
            let text = read_text(notes.as_deref())?;
            let properties: &[VmProperty] = if overwrite { &[] } else { &[VmProperty::Annotation] };
            let vm = find(session, &target, properties).await?;
            Ok(vms.assign_note(&vm, &text, overwrite).await?)
        }

        Command::Power { state, target } => {
            let vm = find(session, &target, &[]).await?;
            match state {
                PowerState::On => {
                    let ip = vms.ensure_on(&vm).await?;
                    info!("{} is running at {ip}", vm.reference);
                }
                PowerState::Off => vms.ensure_off(&vm).await?,
                PowerState::Suspend => vms.suspend(&vm).await?,
            }
            Ok(())
        }

        Command::Relocate { target, destination, name } => {
            let vm = find(session, &target, &[]).await?;
            let name = given(&name).map(|template| generate_name(Some(template), VM_NAME_TEMPLATE, ctx));
            Ok(vms.relocate(&vm, name.as_deref(), given(&destination)).await?)
        }

        Command::Snapshot(verb) => snapshot(session, verb, settings, ctx, out).await,

        Command::Test => {
            if settings.verbose {
                writeln!(out, "Success")?;
            }
            Ok(())
        }

        // Handled before connecting.
        Command::Init | Command::Version => Ok(()),
    }
}

async fn snapshot<P: Platform>(
    session: &Session<P>,
    verb: SnapshotCommand,
    settings: &Settings,
    ctx: &NameContext,
    out: &mut dyn Write,
) -> AppResult<()> {
    let snapshots = session.snapshots();

    match verb {
        SnapshotCommand::Create { target, name } => {
            let vm = find(session, &target, &[]).await?;
            session
                .vms()
                .require_powered_off(&vm, "Cannot get a snapshot of a running machine")
                .await?;
            let name = generate_name(name.as_deref(), SNAPSHOT_NAME_TEMPLATE, ctx);
            let reference = snapshots.create(&vm, &name).await?;
            output::write(out, &report_snapshot(&name, &reference), settings.output)
        }

        SnapshotCommand::List { target } => {
            let vm = find(session, &target, &[VmProperty::Snapshot]).await?;
            output::write(out, &snapshots.list(&vm).await?, settings.output)
        }

        SnapshotCommand::Remove { target, snapshot } => {
            let vm = find(session, &target, &[]).await?;
            match snapshot {
                SnapshotArgs { snapshot: Some(name), snapshot_is_ref } => {
                    let reference = snapshots.find_snapshot(&vm, &name, snapshot_is_ref).await?;
                    snapshots.remove(&reference).await?;
                }
                SnapshotArgs { snapshot: None, .. } => snapshots.remove_all(&vm).await?,
            }
            Ok(())
        }

        SnapshotCommand::Revert { target, snapshot } => {
            let vm = find(session, &target, &[]).await?;
            match snapshot {
                SnapshotArgs { snapshot: Some(name), snapshot_is_ref } => {
                    let reference = snapshots.find_snapshot(&vm, &name, snapshot_is_ref).await?;
                    snapshots.revert_to(&reference).await?;
                }
                SnapshotArgs { snapshot: None, .. } => snapshots.revert(&vm).await?,
            }
            Ok(())
        }
    }
}

/// An empty flag value counts as not given.
fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

async fn find<P: Platform>(
    session: &Session<P>,
    target: &TargetArgs,
    properties: &[VmProperty],
) -> AppResult<VirtualMachine> {
    Ok(session
        .resolver()
        .find_vm(&target.target, target.target_is_ref, properties)
        .await?)
}

fn init(requested: Option<&Path>) -> AppResult<()> {
    let path = match requested {
        Some(path) => path.to_path_buf(),
        None => config::default_config_path()
            .ok_or_else(|| AppError::Config("Could not determine the home directory".to_string()))?,
    };

    let file = config::prompt_file_config()?;
    config::save(&path, &file)?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}
