use std::collections::HashMap;

/// Blur flag last dispatched for each output. Absent means not blurred.
#[derive(Debug, Default)]
pub struct OutputBlurState {
    outputs: HashMap<String, bool>,
}

impl OutputBlurState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blurred(&self, output: &str) -> bool {
        self.outputs.get(output).copied().unwrap_or(false)
    }

    /// Stores `blurred` for `output` and reports whether it differs from the
    /// previous value.
    pub fn record(&mut self, output: &str, blurred: bool) -> bool {
        let previous = self.outputs.insert(output.to_string(), blurred);
        previous.unwrap_or(false) != blurred
    }

    pub fn forget(&mut self, output: &str) {
        self.outputs.remove(output);
    }

    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
