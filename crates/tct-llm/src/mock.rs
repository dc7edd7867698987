//! Deterministic offline model client
//!
//! Replies are chosen by the request's `Operation`. Scripted replies are
//! consumed first, in order; once a script runs dry the canned sample for
//! that operation is returned.

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tct_core::{CompletionRequest, LlmClient, Operation, Result, TctError};

#[derive(Debug, Default)]
struct MockState {
    scripted: HashMap<Operation, VecDeque<String>>,
    failures_remaining: usize,
    requests: Vec<CompletionRequest>,
}

/// Mock LLM client for tests, demos and running without credentials
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
}

impl MockClient {
    /// Create a mock that answers every operation with its canned sample
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next call of `operation`
    pub fn with_response(self, operation: Operation, response: impl Into<String>) -> Self {
        self.lock()
            .scripted
            .entry(operation)
            .or_default()
            .push_back(response.into());
        self
    }

    /// Make the next `n` calls fail with a transport error
    pub fn fail_times(self, n: usize) -> Self {
        self.lock().failures_remaining = n;
        self
    }

    /// Number of calls made so far, failed ones included
    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Every request received, in call order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LlmClient for MockClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut state = self.lock();
        state.requests.push(request.clone());

        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(TctError::Transport("simulated connection failure".to_string()));
        }

        let scripted = state
            .scripted
            .get_mut(&request.operation)
            .and_then(VecDeque::pop_front);

        Ok(scripted.unwrap_or_else(|| canned_response(request.operation).to_string()))
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Sample reply for each operation
pub fn canned_response(operation: Operation) -> serde_json::Value {
    match operation {
        Operation::EntityExtraction => json!({
            "summary": "Sample tax document with VAT rates and filing deadlines",
            "tax_types": ["VAT"],
            "rates": [
                {
                    "name": "standard",
                    "rate": 0.19,
                    "description": "Standard VAT rate",
                    "conditions": ["goods", "services"],
                    "exemptions": ["healthcare", "education"]
                }
            ],
            "brackets": [],
            "thresholds": [
                {
                    "name": "registration_threshold",
                    "amount": 10000,
                    "currency": "EUR",
                    "description": "VAT registration threshold"
                }
            ],
            "deadlines": [
                {
                    "name": "vat_return",
                    "deadline_type": "filing",
                    "frequency": "quarterly",
                    "day_of_period": 15,
                    "description": "Quarterly VAT return"
                }
            ],
            "rules": [],
            "confidence_score": 0.85,
            "warnings": ["Mock data - for demonstration only"]
        }),
        Operation::JsonConfig => json!({
            "version": "1.0",
            "country": "DE",
            "country_name": "Germany",
            "tax_type": "VAT",
            "rules": [
                {
                    "rule_id": "vat_standard",
                    "name": "Standard VAT Rate",
                    "type": "rate",
                    "value": 0.19
                }
            ]
        }),
        Operation::SqlMigration => json!({
            "migration_name": "add_de_vat_rates_20240101",
            "description": "Add German VAT rates",
            "tables_affected": ["tax_rates"],
            "up_script": "INSERT INTO tax_rates (country_code, rate) VALUES ('DE', 0.19);",
            "down_script": "DELETE FROM tax_rates WHERE country_code = 'DE';"
        }),
        Operation::PolicyDefinition => json!({
            "policy_name": "germany_vat_policy",
            "version": "1.0",
            "description": "German VAT policy",
            "rules": []
        }),
        Operation::CodeGeneration => json!({
            "filename": "tax_calculator_de.py",
            "description": "German tax calculator",
            "dependencies": [],
            "code": "# Mock code\nclass TaxCalculator:\n    pass"
        }),
        Operation::HealthCheck => json!({"status": "ok"}),
    }
}
