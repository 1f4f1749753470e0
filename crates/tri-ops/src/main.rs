//! tri-ops: filesystem-backed rebuild coordination.
//!
//! A fleet of independent agents negotiates rebuild work through small JSON
//! records in a shared state directory: heartbeats, a priority queue of
//! requests, time-bounded claims, an exclusive build lock, results, and
//! per-project current-build pointers. Every invocation is short-lived and
//! synchronous; the filesystem is the only channel between agents.

use anyhow::Result;
use clap::Parser;
use serde_json::Value;
use tri_ops::cli::{Cli, Commands};
use tri_ops::commands::{CommandExecutor, EnqueueArgs};
use tri_ops::output::{self, ExitCode};
use tri_ops::storage::json::to_canonical_string;
use tri_ops::storage::{BuildResult, CurrentBuild, Heartbeat, StateLayout};
use tri_ops::OpsError;

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{error}");
            match error.downcast_ref::<OpsError>() {
                Some(ops) => ops.exit_code(),
                None => ExitCode::Negative,
            }
        }
    };

    if exit_code != ExitCode::Success {
        std::process::exit(exit_code.code());
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let layout = StateLayout::resolve(cli.state_dir)?;
    let executor = CommandExecutor::new(layout);

    match cli.command {
        Commands::Init => {
            executor.init()?;
            Ok(ExitCode::Success)
        }

        Commands::Heartbeat {
            agent,
            phase,
            current_task,
            cycle,
            version,
            host,
        } => {
            let heartbeat = Heartbeat::collect(agent, phase, current_task, cycle, version, host);
            executor.heartbeat(&heartbeat)?;
            Ok(ExitCode::Success)
        }

        Commands::RequestRebuild {
            id,
            request_type,
            project,
            projects,
            reason,
            requested_by,
            priority,
            desired_build_commit,
            notes,
        } => {
            let id = executor.request_rebuild(EnqueueArgs {
                id,
                request_type,
                projects: project,
                projects_csv: projects,
                reason,
                requested_by,
                priority,
                desired_build_commit,
                notes,
            })?;
            println!("{id}");
            Ok(ExitCode::Success)
        }

        Commands::ClaimNext {
            agent,
            lease_seconds,
            json,
        } => match executor.claim_next(&agent, lease_seconds)? {
            Some(claimed) => {
                if json {
                    output::print_compact(&claimed)?;
                } else {
                    println!("{}", claimed.id);
                }
                Ok(ExitCode::Success)
            }
            None => Ok(ExitCode::InputError),
        },

        Commands::RenewClaim {
            id,
            agent,
            lease_seconds,
            force,
        } => {
            executor.renew_claim(&id, &agent, lease_seconds, force)?;
            Ok(ExitCode::Success)
        }

        Commands::LockBuild {
            owner,
            request_id,
            lease_seconds,
            force,
        }
        | Commands::RenewLock {
            owner,
            request_id,
            lease_seconds,
            force,
        } => {
            executor.lock_build(&owner, &request_id, lease_seconds, force)?;
            Ok(ExitCode::Success)
        }

        Commands::UnlockBuild {
            owner,
            request_id,
            force,
        } => {
            executor.unlock_build(&owner, request_id.as_deref(), force)?;
            Ok(ExitCode::Success)
        }

        Commands::LockStatus { json } => match executor.lock_status()? {
            Some(lock) => {
                if json {
                    output::print_compact(&lock)?;
                }
                Ok(ExitCode::Success)
            }
            None => Ok(ExitCode::Negative),
        },

        Commands::GcStaleLeases { prune_claims, json } => {
            let summary = executor.gc_stale_leases(prune_claims)?;
            if json {
                output::print_compact(&summary)?;
            }
            Ok(ExitCode::Success)
        }

        Commands::WriteResult {
            id,
            status,
            published_build_path,
            build_commit,
            log,
            error,
        } => {
            let result =
                BuildResult::new(id, status, published_build_path, build_commit, log, error);
            executor.write_result(&result)?;
            Ok(ExitCode::Success)
        }

        Commands::CurrentBuild { project, field } => {
            let Some(record) = executor.current_build(&project)? else {
                return Ok(ExitCode::InputError);
            };
            match field {
                Some(field) => match record.get(&field) {
                    None | Some(Value::Null) => Ok(ExitCode::InputError),
                    Some(Value::String(text)) => {
                        println!("{text}");
                        Ok(ExitCode::Success)
                    }
                    Some(value) => {
                        println!("{}", to_canonical_string(value)?);
                        Ok(ExitCode::Success)
                    }
                },
                None => {
                    output::print_compact(&record)?;
                    Ok(ExitCode::Success)
                }
            }
        }

        Commands::WriteCurrent {
            project,
            path,
            executable,
            build_commit,
            build_id,
            request_id,
            notes,
        } => {
            let pointer = CurrentBuild::new(
                &project,
                path,
                executable,
                build_commit,
                build_id,
                request_id,
                notes,
            );
            executor.write_current(&pointer)?;
            Ok(ExitCode::Success)
        }

        Commands::ArchiveRequest { id } => {
            executor.archive_request(&id)?;
            Ok(ExitCode::Success)
        }
    }
}
