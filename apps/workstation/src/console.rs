//! Line-oriented operator console for the positioning tab.
//!
//! Operator mistakes (bad numbers, busy actuator, nothing to revert) are
//! printed as notices and the session keeps going. Only I/O failures on the
//! console streams end the loop.

use std::{
    fs,
    io::{BufRead, Write},
    path::PathBuf,
};

use anyhow::Context;
use chrono::{DateTime, Local};
use imaging::NormalizedImage;
use positioning::{
    fields::parse_field, ActuatorPreview, CommitEvent, KinematicMapper, Move, PoseField,
    PoseForm, PositionCommitProtocol,
};
use serde::Serialize;
use shared::error::{OperatorNotice, PositioningError};
use tracing::{debug, info, warn};

use crate::config::{prepare_session_dir, Settings};

const HELP: &str = "commands:
  go [x [y [z [phi [theta]]]]]  move to the typed image-space pose
  pick <slice> <x> <y>          take X/Y/Z from a voxel of the loaded scan
  home                          return to the home pose and reset the trail
  back                          return to the pose before the latest move
  status                        show state, current pose and preview
  history                       list committed moves
  export                        write the trail to the experiment directory
  quit                          leave the session";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Go(Vec<String>),
    Pick(Vec<String>),
    Home,
    Back,
    Status,
    History,
    Export,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Result<Command, String>> {
    let mut words = line.split_whitespace();
    let head = words.next()?;
    let command = match head.to_ascii_lowercase().as_str() {
        "go" => Command::Go(words.map(str::to_string).collect()),
        "pick" => Command::Pick(words.map(str::to_string).collect()),
        "home" => Command::Home,
        "back" => Command::Back,
        "status" => Command::Status,
        "history" => Command::History,
        "export" => Command::Export,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Some(Err(other.to_string())),
    };
    Some(Ok(command))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Serialize)]
struct HistoryExport<'a> {
    exported_at: DateTime<Local>,
    arm_length_mm: f64,
    moves: &'a [Move],
}

pub struct Console {
    protocol: PositionCommitProtocol,
    form: PoseForm,
    preview: ActuatorPreview,
    settings: Settings,
    image: Option<NormalizedImage>,
}

impl Console {
    pub fn new(protocol: PositionCommitProtocol, settings: Settings) -> Self {
        let mut form = PoseForm::new(settings.default_theta_deg);
        let preview = ActuatorPreview::attach(protocol.mapper(), &mut form);
        Self {
            protocol,
            form,
            preview,
            settings,
            image: None,
        }
    }

    /// Scan the `pick` command reads voxels from.
    pub fn with_image(mut self, image: NormalizedImage) -> Self {
        self.image = Some(image);
        self
    }

    #[cfg(test)]
    pub fn protocol(&self) -> &PositionCommitProtocol {
        &self.protocol
    }

    /// Reads commands until `quit` or end of input.
    pub fn run(&mut self, input: impl BufRead, out: &mut impl Write) -> anyhow::Result<()> {
        writeln!(out, "positioning console ready, type 'help' for commands")?;
        for line in input.lines() {
            let line = line.context("failed to read console input")?;
            if self.execute(&line, out)? == Flow::Quit {
                break;
            }
        }
        info!(moves = self.protocol.history_len(), "console session closed");
        Ok(())
    }

    pub fn execute(&mut self, line: &str, out: &mut impl Write) -> anyhow::Result<Flow> {
        let command = match parse_command(line) {
            None => return Ok(Flow::Continue),
            Some(Ok(command)) => command,
            Some(Err(unknown)) => {
                writeln!(out, "unknown command '{unknown}', type 'help'")?;
                return Ok(Flow::Continue);
            }
        };
        debug!(?command, "console command");

        match command {
            Command::Go(texts) => self.go(&texts, out)?,
            Command::Pick(args) => self.pick(&args, out)?,
            Command::Home => {
                let outcome = self.protocol.home().and_then(|ticket| ticket.wait());
                self.report(outcome, "homed", out)?;
            }
            Command::Back => {
                let outcome = self.protocol.go_back().and_then(|ticket| ticket.wait());
                self.report(outcome, "moved back to", out)?;
            }
            Command::Status => self.status(out)?,
            Command::History => self.history(out)?,
            Command::Export => match self.export(Local::now()) {
                Ok(path) => writeln!(out, "history exported to {}", path.display())?,
                Err(err) => {
                    warn!("history export failed: {err:#}");
                    writeln!(out, "export failed: {err:#}")?;
                }
            },
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
        }
        self.drain_events();
        Ok(Flow::Continue)
    }

    fn go(&mut self, texts: &[String], out: &mut impl Write) -> anyhow::Result<()> {
        if texts.len() > PoseField::ALL.len() {
            writeln!(out, "go takes at most {} values", PoseField::ALL.len())?;
            return Ok(());
        }
        let entries: Vec<(PoseField, &str)> = PoseField::ALL
            .into_iter()
            .zip(texts.iter().map(String::as_str))
            .collect();
        if let Err(err) = apply_all(&mut self.form, &entries) {
            return notice(out, &err);
        }
        writeln!(out, "actuator target {:?}", self.preview.latest().components())?;

        let outcome = self
            .protocol
            .go_to(self.form.pose())
            .and_then(|ticket| ticket.wait());
        if outcome.is_ok() {
            self.form.clear();
        }
        self.report(outcome, "moved to", out)
    }

    fn pick(&mut self, args: &[String], out: &mut impl Write) -> anyhow::Result<()> {
        let Some(image) = self.image.as_ref() else {
            writeln!(out, "no scan loaded, start the session with --volume")?;
            return Ok(());
        };
        let [slice, x, y] = match args {
            [slice, x, y] => [slice, x, y],
            _ => {
                writeln!(out, "usage: pick <slice> <x> <y>")?;
                return Ok(());
            }
        };
        let Ok(slice_index) = slice.parse::<usize>() else {
            return notice(out, &PositioningError::validation("slice", slice.as_str()));
        };
        let x = match parse_field(PoseField::X, x, f64::NAN) {
            Ok(value) => value,
            Err(err) => return notice(out, &err),
        };
        let y = match parse_field(PoseField::Y, y, f64::NAN) {
            Ok(value) => value,
            Err(err) => return notice(out, &err),
        };
        let Some(voxel) = image.pick(slice_index, x, y) else {
            warn!(slice = slice_index, x, y, "pick outside the displayed volume");
            writeln!(out, "warning: ({x}, {y}) on slice {slice_index} is outside the scan")?;
            return Ok(());
        };

        let texts = voxel.coordinates().map(|value| value.to_string());
        let entries = [
            (PoseField::X, texts[0].as_str()),
            (PoseField::Y, texts[1].as_str()),
            (PoseField::Z, texts[2].as_str()),
        ];
        if let Err(err) = apply_all(&mut self.form, &entries) {
            return notice(out, &err);
        }
        info!(?voxel, "target taken from scan");
        writeln!(
            out,
            "target x={} y={} z={}, actuator {:?}",
            texts[0],
            texts[1],
            texts[2],
            self.preview.latest().components()
        )?;
        Ok(())
    }

    fn report(
        &self,
        outcome: Result<Move, PositioningError>,
        verb: &str,
        out: &mut impl Write,
    ) -> anyhow::Result<()> {
        match outcome {
            Ok(record) => {
                let pose = record.target_image_pose;
                writeln!(
                    out,
                    "{verb} x={} y={} z={} phi={} theta={} (delta {:?})",
                    pose.x,
                    pose.y,
                    pose.z,
                    pose.phi,
                    pose.theta,
                    record.delta.components()
                )?;
                Ok(())
            }
            Err(err) => notice(out, &err),
        }
    }

    fn status(&self, out: &mut impl Write) -> anyhow::Result<()> {
        let pose = self.protocol.current_pose();
        writeln!(out, "state: {:?}", self.protocol.state())?;
        writeln!(
            out,
            "current: x={} y={} z={} phi={} theta={}",
            pose.x, pose.y, pose.z, pose.phi, pose.theta
        )?;
        writeln!(out, "preview: {:?}", self.preview.latest().components())?;
        writeln!(out, "trail: {} entries", self.protocol.history_len())?;
        Ok(())
    }

    fn history(&self, out: &mut impl Write) -> anyhow::Result<()> {
        let history = self.protocol.history_snapshot();
        if history.is_empty() {
            writeln!(out, "no committed moves")?;
            return Ok(());
        }
        for (index, record) in history.moves().iter().enumerate() {
            writeln!(
                out,
                "{index:>3}: image {:?} actuator {:?} delta {:?}",
                [
                    record.target_image_pose.x,
                    record.target_image_pose.y,
                    record.target_image_pose.z,
                    record.target_image_pose.phi,
                    record.target_image_pose.theta,
                ],
                record.target_actuator_pose.components(),
                record.delta.components()
            )?;
        }
        if let Err(mismatch) = history.verify_deltas() {
            warn!(index = mismatch.index, "trail deltas are inconsistent");
            writeln!(out, "warning: {mismatch}")?;
        }
        Ok(())
    }

    /// Writes the trail to `<experiments_dir>/<YYYY-MM-DD>/movements_<HHMMSS>.json`.
    pub fn export(&self, now: DateTime<Local>) -> anyhow::Result<PathBuf> {
        let dir = prepare_session_dir(&self.settings, now.date_naive())?;
        let path = dir.join(format!("movements_{}.json", now.format("%H%M%S")));
        let history = self.protocol.history_snapshot();
        let document = HistoryExport {
            exported_at: now,
            arm_length_mm: self.protocol.mapper().arm_length_mm(),
            moves: history.moves(),
        };
        let json = serde_json::to_string_pretty(&document)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        info!(path = %path.display(), moves = history.size(), "history exported");
        Ok(path)
    }

    fn drain_events(&self) {
        for event in self.protocol.events().try_iter() {
            match event {
                CommitEvent::Started { target } => debug!(?target, "move started"),
                CommitEvent::Completed(record) => debug!(delta = ?record.delta, "move completed"),
                CommitEvent::Homed(_) => debug!("trail reset at home"),
                CommitEvent::Failed { target, error } => debug!(?target, %error, "move failed"),
            }
        }
    }
}

/// Applies every entry or none: all texts are checked before the form changes.
fn apply_all(form: &mut PoseForm, entries: &[(PoseField, &str)]) -> Result<(), PositioningError> {
    for (field, text) in entries {
        parse_field(*field, text, form.placeholder(*field))?;
    }
    for (field, text) in entries {
        form.set_text(*field, text)?;
    }
    Ok(())
}

/// One-shot preview for the `preview` command. Rejected fields are reported
/// and left at their placeholder.
pub fn render_preview(
    mapper: KinematicMapper,
    default_theta_deg: f64,
    texts: [Option<String>; 5],
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut form = PoseForm::new(default_theta_deg);
    let preview = ActuatorPreview::attach(mapper, &mut form);
    for (field, text) in PoseField::ALL.into_iter().zip(texts) {
        if let Some(text) = text {
            if let Err(err) = form.set_text(field, &text) {
                notice(out, &err)?;
            }
        }
    }

    let pose = form.pose();
    writeln!(
        out,
        "image:    x={} y={} z={} phi={} theta={}",
        pose.x, pose.y, pose.z, pose.phi, pose.theta
    )?;
    let actuator = preview.latest();
    writeln!(
        out,
        "actuator: x={:.3} y={:.3} z={:.3} phi={} theta={}",
        actuator.x(),
        actuator.y(),
        actuator.z(),
        actuator.phi(),
        actuator.theta()
    )?;
    Ok(())
}

fn notice(out: &mut impl Write, err: &PositioningError) -> anyhow::Result<()> {
    let notice = OperatorNotice::from(err);
    let level = if err.is_warning() { "warning" } else { "error" };
    writeln!(out, "{level} [{:?}]: {}", notice.code, notice.message)?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
