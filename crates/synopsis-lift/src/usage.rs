//! Token usage tracking across generation attempts.

use serde::Serialize;
use synopsis_core::schema::RawResponse;

/// Usage totals for one `generate()` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Calls that reached the service, successful or not.
    pub calls: usize,
    /// Successful calls whose response carried no usage numbers.
    pub unreported_calls: usize,
}

impl std::fmt::Display for UsageTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} call(s), ~{} input / ~{} output tokens",
            self.calls, self.input_tokens, self.output_tokens
        )?;
        if self.unreported_calls > 0 {
            write!(f, " ({} without usage data)", self.unreported_calls)?;
        }
        Ok(())
    }
}

/// Running usage tracker during a generation run.
#[derive(Debug, Default)]
pub struct UsageTracker {
    totals: UsageTotals,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record token usage from a response.
    pub fn record(&mut self, response: &RawResponse) {
        self.totals.calls += 1;
        if response.input_tokens.is_none() && response.output_tokens.is_none() {
            self.totals.unreported_calls += 1;
        }
        if let Some(t) = response.input_tokens {
            self.totals.input_tokens += t;
        }
        if let Some(t) = response.output_tokens {
            self.totals.output_tokens += t;
        }
    }

    /// Record a call that failed before returning a response.
    pub fn record_failure(&mut self) {
        self.totals.calls += 1;
    }

    pub fn totals(&self) -> UsageTotals {
        self.totals
    }
}
