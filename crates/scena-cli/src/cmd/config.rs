//! `scena config`: print the effective configuration.

use crate::backend::Session;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use scena_core::config::EffectiveConfig;
use scena_core::model::ProjectId;
use std::io::{self, Write};

fn or_unset(value: Option<&str>) -> &str {
    value.unwrap_or("(unset)")
}

fn write_text(cfg: &EffectiveConfig, w: &mut dyn Write) -> io::Result<()> {
    let path = cfg.config_path.as_ref().map(|p| p.display().to_string());
    writeln!(w, "config_path\t{}", or_unset(path.as_deref()))?;
    writeln!(w, "server_url\t{}", or_unset(cfg.server_url.as_deref()))?;
    writeln!(
        w,
        "project\t{}",
        or_unset(cfg.project.as_ref().map(ProjectId::as_str))
    )?;
    writeln!(w, "token\t{}", if cfg.token.is_some() { "<set>" } else { "(unset)" })?;
    writeln!(w, "poll_interval_ms\t{}", cfg.poll_interval_ms)?;
    writeln!(w, "request_timeout_ms\t{}", cfg.request_timeout_ms)?;
    writeln!(w, "output\t{}", cfg.resolved_output)
}

fn write_pretty(cfg: &EffectiveConfig, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Effective configuration")?;
    let path = cfg.config_path.as_ref().map(|p| p.display().to_string());
    pretty_kv(w, "Config file", or_unset(path.as_deref()))?;
    pretty_kv(w, "Server", or_unset(cfg.server_url.as_deref()))?;
    pretty_kv(w, "Project", or_unset(cfg.project.as_ref().map(ProjectId::as_str)))?;
    pretty_kv(w, "Token", if cfg.token.is_some() { "<set>" } else { "(unset)" })?;
    pretty_kv(w, "Poll every", format!("{} ms", cfg.poll_interval_ms))?;
    pretty_kv(w, "Timeout", format!("{} ms", cfg.request_timeout_ms))?;
    pretty_kv(w, "Output", &cfg.resolved_output)
}

pub fn run_config(session: &Session, output: OutputMode) -> anyhow::Result<()> {
    render_mode(output, &session.config, write_text, write_pretty)
}
