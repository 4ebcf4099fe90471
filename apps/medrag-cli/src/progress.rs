use indicatif::{ProgressBar, ProgressStyle};

use medrag_core::types::{Progress, Stage};

const TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Renders pipeline [`Progress`] updates, one bar per stage.
pub struct Bars {
    current: Option<(Stage, ProgressBar)>,
    hidden: bool,
}

impl Bars {
    pub fn new(hidden: bool) -> Self {
        Self { current: None, hidden }
    }

    pub fn update(&mut self, p: Progress) {
        let same_stage = matches!(&self.current, Some((stage, _)) if *stage == p.stage);
        if !same_stage {
            self.finish();
            self.current = Some((p.stage, self.bar(p)));
        }
        if let Some((_, bar)) = &self.current {
            bar.set_length(p.total as u64);
            bar.set_position(p.done as u64);
        }
    }

    pub fn finish(&mut self) {
        if let Some((_, bar)) = self.current.take() {
            bar.finish();
        }
    }

    fn bar(&self, p: Progress) -> ProgressBar {
        if self.hidden {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(p.total as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(label(p.stage));
        bar
    }
}

fn label(stage: Stage) -> String {
    match stage {
        Stage::Extracting => "files extracted".to_string(),
        Stage::Embedding(kind) => format!("{kind} chunks embedded"),
    }
}
