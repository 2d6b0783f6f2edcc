use super::settings::MaterialSettings;

/// Version tracker - marks changes that invalidate a linked program
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeTracker {
    version: u64,
}

impl ChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self { version: 0 }
    }

    /// Marks as modified, increments version by 1
    pub fn changed(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Gets the current version number
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Mutable view of [`MaterialSettings`]; bumps the version on drop when a
/// field that shapes the generated source changed.
pub struct SettingsGuard<'a> {
    settings: &'a mut MaterialSettings,
    tracker: &'a mut ChangeTracker,
    initial: MaterialSettings,
}

impl<'a> SettingsGuard<'a> {
    pub(crate) fn new(settings: &'a mut MaterialSettings, tracker: &'a mut ChangeTracker) -> Self {
        let initial = settings.clone();
        Self {
            settings,
            tracker,
            initial,
        }
    }
}

impl std::ops::Deref for SettingsGuard<'_> {
    type Target = MaterialSettings;
    fn deref(&self) -> &Self::Target {
        self.settings
    }
}

impl std::ops::DerefMut for SettingsGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.settings
    }
}

impl Drop for SettingsGuard<'_> {
    fn drop(&mut self) {
        if self.initial.requires_rebuild(self.settings) {
            self.tracker.changed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Precision;
    use crate::shader::ShaderFeatures;

    #[test]
    fn guard_bumps_only_on_source_changes() {
        let mut settings = MaterialSettings::default();
        let mut tracker = ChangeTracker::new();

        SettingsGuard::new(&mut settings, &mut tracker).debug_print_sources = true;
        assert_eq!(tracker.version(), 0);

        SettingsGuard::new(&mut settings, &mut tracker).features |= ShaderFeatures::TIME;
        assert_eq!(tracker.version(), 1);

        SettingsGuard::new(&mut settings, &mut tracker).precision = Precision::Highp;
        assert_eq!(tracker.version(), 2);

        // unchanged value
        SettingsGuard::new(&mut settings, &mut tracker).precision = Precision::Highp;
        assert_eq!(tracker.version(), 2);
    }
}
