/* src/build/src/ui.rs */

// Terminal reporting for the build orchestrator. One reporter instance per
// build run; it owns the step counter and the clock so call sites only say
// what happened.

use std::time::Instant;

use pyra_core::Manifest;

/// The orchestrator's fixed step count; `step()` numbers against it.
const TOTAL_STEPS: u32 = 6;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn paint(code: &str, text: &str) -> String {
  format!("\x1b[{code}m{text}\x1b[0m")
}

fn bold(text: &str) -> String {
  paint("1", text)
}

fn dim(text: &str) -> String {
  paint("2", text)
}

fn red(text: &str) -> String {
  paint("31", text)
}

fn green(text: &str) -> String {
  paint("32", text)
}

fn yellow(text: &str) -> String {
  paint("33", text)
}

/// Step-numbered progress for one build run.
pub struct BuildProgress {
  step: u32,
  started: Instant,
}

impl BuildProgress {
  pub fn start(project: &str) -> Self {
    println!();
    println!("  {} {}", bold("Pyra build"), dim(&format!("{project} \u{00b7} v{VERSION}")));
    println!();
    Self { step: 0, started: Instant::now() }
  }

  pub fn step(&mut self, title: &str) {
    self.step += 1;
    println!("  {} {title}...", bold(&format!("[{}/{TOTAL_STEPS}]", self.step)));
  }

  pub fn current_step(&self) -> u32 {
    self.step
  }

  /// One produced artifact or completed sub-task under the current step.
  pub fn artifact(&self, msg: &str) {
    println!("        {} {msg}", green("\u{2713}"));
  }

  pub fn note(&self, msg: &str) {
    println!("        {msg}");
  }

  pub fn warn(&self, msg: &str) {
    println!("        {} {msg}", yellow("warning:"));
  }

  /// Outcome line for one bundle pass.
  pub fn pass(&self, label: &str, outputs: usize, bytes: u64) {
    let size = dim(&format!("({})", format_size(bytes)));
    self.artifact(&format!("{label}: {outputs} outputs {size}"));
  }

  pub fn finish(&self, manifest: &Manifest, prerendered: u32) {
    println!();
    println!(
      "  {} build complete in {:.1}s",
      green("\u{2713}"),
      self.started.elapsed().as_secs_f64()
    );
    println!(
      "        {} routes \u{00b7} {prerendered} prerendered \u{00b7} {} assets",
      manifest.routes.len(),
      manifest.assets.len()
    );
  }

  pub fn failed(&self, err: &anyhow::Error) {
    println!();
    println!(
      "  {} build failed after {:.1}s",
      red("\u{2717}"),
      self.started.elapsed().as_secs_f64()
    );
    println!("        {err:#}");
  }
}

/// Human-readable byte count, decimal units.
pub fn format_size(bytes: u64) -> String {
  if bytes < 1_000 {
    return format!("{bytes} B");
  }
  let mut value = bytes as f64 / 1_000.0;
  for unit in ["kB", "MB"] {
    if value < 1_000.0 {
      return format!("{value:.1} {unit}");
    }
    value /= 1_000.0;
  }
  format!("{value:.1} GB")
}
