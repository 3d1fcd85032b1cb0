#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Binary search over the automation list failed to find a bracketing
    /// interval. Given the sortedness invariant on `tempo_automation_events`
    /// this should be unreachable; surfacing it as an error rather than a
    /// panic keeps a malformed-but-not-crashing project file from taking the
    /// whole process down.
    #[error("inconsistent automation list: no bracketing interval for beat {beat}")]
    InconsistentAutomation { beat: f64 },
}
