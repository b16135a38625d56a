//! Host registry CLI commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use std::time::Duration;

use crate::cli::open_farm;
use crate::cli::output::{format_age, list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{Config, Host};

#[derive(Args, Debug)]
pub struct HostArgs {
    #[command(subcommand)]
    pub command: HostCommands,
}

#[derive(Subcommand, Debug)]
pub enum HostCommands {
    /// Register a new host
    Add {
        /// Host name
        name: String,
        /// Platform description
        #[arg(short, long)]
        platform: Option<String>,
        /// Owner name
        #[arg(short, long, requires = "email")]
        owner: Option<String>,
        /// Owner email address
        #[arg(short, long, requires = "owner")]
        email: Option<String>,
        /// Upload password
        #[arg(long)]
        password: Option<String>,
        /// Fully qualified domain name
        #[arg(long)]
        fqdn: Option<String>,
    },
    /// Remove a host
    Remove {
        /// Host name
        name: String,
    },
    /// List hosts with their last upload
    List,
    /// Show host details
    Show {
        /// Host name
        name: String,
    },
    /// Change a host's platform
    SetPlatform {
        /// Host name
        name: String,
        /// New platform description
        platform: String,
    },
    /// Change a host's owner
    SetOwner {
        /// Host name
        name: String,
        /// Owner name
        owner: String,
        /// Owner email address
        email: String,
    },
    /// List hosts that stopped uploading
    Dead {
        /// Days without an archived build
        #[arg(short, long, default_value = "60")]
        days: u64,
        /// Record that their owners were notified
        #[arg(long)]
        mark_notified: bool,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct HostListOutput {
    pub hosts: Vec<Host>,
    #[serde(skip)]
    pub now: DateTime<Utc>,
}

impl CommandOutput for HostListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["name", "platform", "owner", "last upload"]);
        for host in &self.hosts {
            table.add_row(vec![
                host.name.clone(),
                truncate(host.platform.as_deref().unwrap_or("-"), 30),
                host.owner.clone().unwrap_or_else(|| "-".to_string()),
                host.last_update
                    .map_or_else(|| "never".to_string(), |t| format!("{} ago", format_age(t, self.now))),
            ]);
        }
        render_list("host", &table, self.hosts.len())
    }
}

#[derive(Debug, serde::Serialize)]
pub struct HostDetailOutput {
    pub host: Host,
    pub last_build: Option<DateTime<Utc>>,
    pub pending_uploads: bool,
}

impl CommandOutput for HostDetailOutput {
    fn to_human(&self) -> String {
        let host = &self.host;
        let mut lines = vec![
            format!("Host: {}", host.name),
            format!("Platform: {}", host.platform.as_deref().unwrap_or("-")),
        ];
        if let Some((owner, email)) = host.owner_contact() {
            lines.push(format!("Owner: {owner} <{email}>"));
        }
        if let Some(fqdn) = &host.fqdn {
            lines.push(format!("FQDN: {fqdn}"));
        }
        if let Some(joined) = host.join_time {
            lines.push(format!("Joined: {}", joined.format("%Y-%m-%d %H:%M")));
        }
        lines.push(format!(
            "Last build: {}",
            self.last_build
                .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
        ));
        if let Some(mailed) = host.last_dead_mail {
            lines.push(format!("Last dead-host mail: {}", mailed.format("%Y-%m-%d %H:%M")));
        }
        if self.pending_uploads {
            lines.push("Has uploads waiting in the inbox".to_string());
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct HostActionOutput {
    pub success: bool,
    pub message: String,
}

impl CommandOutput for HostActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

fn done(message: String) -> HostActionOutput {
    HostActionOutput {
        success: true,
        message,
    }
}

pub async fn execute(args: HostArgs, config: &Config, json_mode: bool) -> Result<()> {
    let farm = open_farm(config).await?;
    let hosts = farm.hosts();

    match args.command {
        HostCommands::Add {
            name,
            platform,
            owner,
            email,
            password,
            fqdn,
        } => {
            let mut host = Host::new(&name);
            host.platform = platform;
            host.owner = owner;
            host.owner_email = email;
            host.password = password;
            host.fqdn = fqdn;
            hosts.create_host(&host).await?;
            output(&done(format!("Added host {name}")), json_mode);
        }
        HostCommands::Remove { name } => {
            hosts.delete_host(&name).await?;
            output(&done(format!("Removed host {name}")), json_mode);
        }
        HostCommands::List => {
            let list = hosts.host_ages().await.context("Failed to list hosts")?;
            output(
                &HostListOutput {
                    hosts: list,
                    now: Utc::now(),
                },
                json_mode,
            );
        }
        HostCommands::Show { name } => {
            let host = hosts
                .host(&name)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No such host: {name}"))?;
            let last_build = farm.host_last_build(&name).await?;
            let pending_uploads = farm.inbox().has_host(&name)?;
            output(
                &HostDetailOutput {
                    host,
                    last_build,
                    pending_uploads,
                },
                json_mode,
            );
        }
        HostCommands::SetPlatform { name, platform } => {
            hosts.update_platform(&name, &platform).await?;
            output(&done(format!("Platform of {name} set to {platform}")), json_mode);
        }
        HostCommands::SetOwner { name, owner, email } => {
            hosts.update_owner(&name, &owner, &email).await?;
            output(&done(format!("Owner of {name} set to {owner} <{email}>")), json_mode);
        }
        HostCommands::Dead { days, mark_notified } => {
            let age = Duration::from_secs(days * 86_400);
            let dead = hosts.dead_hosts(age).await.context("Failed to query dead hosts")?;
            if mark_notified {
                for host in &dead {
                    hosts.sent_dead_mail(&host.name).await?;
                }
            }
            output(
                &HostListOutput {
                    hosts: dead,
                    now: Utc::now(),
                },
                json_mode,
            );
        }
    }

    Ok(())
}
