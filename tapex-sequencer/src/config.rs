use std::path::Path;

use serde::{Deserialize, Serialize};
use tapex_core::{ConfigError, Dims, KeyPolicy, MicroStep, PlanSpec, TrialPlan};

/// Where `start()` lands.
#[derive(Copy, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadIn {
    /// First micro-step of the first condition
    #[default]
    Countdown,
    /// Straight onto the first condition's phrase
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(flatten)]
    pub plan: PlanSpec,
    pub micro_steps: Vec<MicroStep>,
    pub pre_roll_secs: u32,
    pub silence_secs: u32,
    /// Overrides the very first countdown of the session
    pub initial_countdown_secs: Option<u32>,
    pub lead_in: LeadIn,
    pub key_policy: KeyPolicy,
    /// Volume-check excerpt playable from the start screen
    pub sample_source: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            plan: PlanSpec::default(),
            micro_steps: vec![MicroStep::PreRoll, MicroStep::Phrase],
            pre_roll_secs: 3,
            silence_secs: 3,
            initial_countdown_secs: Some(5),
            lead_in: LeadIn::Countdown,
            key_policy: KeyPolicy::Letters,
            sample_source: Some("phrases/Sample/16.wav".to_string()),
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.plan.validate()?;

        let phrases = self.micro_steps.iter().filter(|s| s.is_phrase()).count();
        if phrases != 1 {
            return Err(ConfigError::PhraseStepCount(phrases));
        }
        for step in &self.micro_steps {
            if step.is_countdown() && self.wait_secs(*step) == 0 {
                return Err(ConfigError::ZeroCountdown { step: step.label() });
            }
        }
        if self.initial_countdown_secs == Some(0) {
            return Err(ConfigError::ZeroCountdown { step: "initial" });
        }
        Ok(())
    }

    pub fn build_plan<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Result<TrialPlan, ConfigError> {
        TrialPlan::build(&self.plan, rng)
    }

    /// Configured wait for a countdown step; zero for the phrase.
    pub fn wait_secs(&self, step: MicroStep) -> u32 {
        match step {
            MicroStep::PreRoll => self.pre_roll_secs,
            MicroStep::Silence => self.silence_secs,
            MicroStep::Phrase => 0,
        }
    }

    pub fn phrase_step(&self) -> usize {
        self.micro_steps
            .iter()
            .position(MicroStep::is_phrase)
            .unwrap_or_default()
    }

    pub fn dims(&self, plan: &TrialPlan) -> Dims {
        Dims {
            runs: plan.run_count(),
            conditions: plan.condition_count(),
            steps: self.micro_steps.len(),
        }
    }
}
