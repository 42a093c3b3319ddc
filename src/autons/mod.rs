//! Autonomous routines and picking which one runs.

pub mod generic;

use alloc::{
    boxed::Box,
    string::{String, ToString},
    vec::Vec,
};

use async_trait::async_trait;
use log::info;

pub use generic::GenericAuto;

use crate::error::{ConfigError, Result};

/// A routine that can be offered in an [`AutoChooser`].
///
/// `R` is whatever the routine needs to drive the robot, usually a struct of
/// shared subsystem handles.
#[async_trait(?Send)]
pub trait AutonRoutine<R> {
    fn name(&self) -> &'static str;

    async fn run(&self, robot: &mut R);
}

/// Registry of routines by name, with one of them selected.
pub struct AutoChooser<R> {
    routines: Vec<Box<dyn AutonRoutine<R>>>,
    selected: Option<usize>,
    default: usize,
}

impl<R> Default for AutoChooser<R> {
    fn default() -> Self {
        Self {
            routines: Vec::new(),
            selected: None,
            default: 0,
        }
    }
}

impl<R> AutoChooser<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names must be unique.
    pub fn register(&mut self, routine: Box<dyn AutonRoutine<R>>) -> Result<()> {
        let name = routine.name();
        if self.position(name).is_some() {
            return Err(ConfigError::DuplicateRoutine(name.to_string()));
        }
        self.routines.push(routine);
        Ok(())
    }

    /// The routine used when nothing has been selected.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        self.default = self
            .position(name)
            .ok_or_else(|| ConfigError::UnknownRoutine(name.to_string()))?;
        Ok(())
    }

    pub fn select(&mut self, name: &str) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| ConfigError::UnknownRoutine(name.to_string()))?;
        info!("selected autonomous {name:?}");
        self.selected = Some(index);
        Ok(())
    }

    /// Clears the selection, falling back to the default.
    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Name of the routine that would run now.
    pub fn choice(&self) -> Option<&'static str> {
        self.current().map(|routine| routine.name())
    }

    pub fn names(&self) -> Vec<String> {
        self.routines
            .iter()
            .map(|routine| routine.name().to_string())
            .collect()
    }

    /// Runs the selected routine, or the default one. Returns `false` if no
    /// routines are registered.
    pub async fn run(&self, robot: &mut R) -> bool {
        let Some(routine) = self.current() else {
            return false;
        };
        info!("running autonomous {:?}", routine.name());
        routine.run(robot).await;
        true
    }

    fn current(&self) -> Option<&dyn AutonRoutine<R>> {
        self.routines
            .get(self.selected.unwrap_or(self.default))
            .map(|routine| &**routine)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.routines.iter().position(|routine| routine.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use futures::executor::block_on;

    use super::*;

    struct Named(&'static str);

    #[async_trait(?Send)]
    impl AutonRoutine<Vec<&'static str>> for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn run(&self, ran: &mut Vec<&'static str>) {
            ran.push(self.0);
        }
    }

    fn chooser() -> AutoChooser<Vec<&'static str>> {
        let mut chooser = AutoChooser::new();
        for name in ["left", "right", "skills"] {
            chooser.register(Box::new(Named(name))).unwrap();
        }
        chooser
    }

    #[test]
    fn runs_the_selected_routine() {
        let mut chooser = chooser();
        assert_eq!(chooser.names(), ["left", "right", "skills"]);
        chooser.select("skills").unwrap();
        assert_eq!(chooser.choice(), Some("skills"));

        let mut ran = vec![];
        assert!(block_on(chooser.run(&mut ran)));
        assert_eq!(ran, ["skills"]);
    }

    #[test]
    fn falls_back_to_the_default() {
        let mut chooser = chooser();
        assert_eq!(chooser.choice(), Some("left"));
        chooser.set_default("right").unwrap();
        chooser.select("skills").unwrap();
        chooser.deselect();
        assert_eq!(chooser.choice(), Some("right"));
    }

    #[test]
    fn registration_errors() {
        let mut chooser = chooser();
        assert_eq!(
            chooser.register(Box::new(Named("left"))),
            Err(ConfigError::DuplicateRoutine("left".to_string()))
        );
        assert_eq!(
            chooser.select("middle"),
            Err(ConfigError::UnknownRoutine("middle".to_string()))
        );
        assert_eq!(chooser.choice(), Some("left"));
    }

    #[test]
    fn empty_chooser_runs_nothing() {
        let chooser = AutoChooser::<Vec<&'static str>>::new();
        assert_eq!(chooser.choice(), None);
        assert!(!block_on(chooser.run(&mut vec![])));
    }
}
