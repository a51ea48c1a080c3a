//! Registered system tests.

use crate::array::cli::CliOutput;
use crate::core::errors::{HarnessError, Result};
use crate::harness::context::TestContext;
use crate::harness::fixture::CreateBasicVolume;
use crate::harness::result::Expectation;
use crate::logger::jsonl::{EventType, LogEntry, Severity};

/// One end-to-end test against the array.
///
/// `execute` drives the array and returns the reply the verdict is judged
/// from. Result bookkeeping and teardown belong to
/// [`crate::harness::lifecycle::run_test`].
pub trait SystemTest {
    /// Stable identity; also names the result file.
    fn name(&self) -> &'static str;
    /// One-line description for listings.
    fn summary(&self) -> &'static str;
    /// How the judged reply maps to a verdict.
    fn expectation(&self) -> Expectation;
    /// Run the scenario and return the judged reply.
    fn execute(&self, ctx: &mut TestContext) -> Result<CliOutput>;
}

/// Provision the baseline volume and expect `volume create` to succeed.
#[derive(Debug, Default, Clone, Copy)]
pub struct CreateVolumeBasic;

impl SystemTest for CreateVolumeBasic {
    fn name(&self) -> &'static str {
        "CREATE_VOL_BASIC_1"
    }

    fn summary(&self) -> &'static str {
        "create a volume on a freshly mounted array"
    }

    fn expectation(&self) -> Expectation {
        Expectation::Success
    }

    fn execute(&self, ctx: &mut TestContext) -> Result<CliOutput> {
        let fixture = CreateBasicVolume { test: self.name() };
        fixture.prepare_array(ctx)?;
        fixture.create_volume(ctx)
    }
}

/// Rename the baseline volume to a name containing a special character and
/// expect the array to refuse.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenameVolumeSpecialChar;

impl SystemTest for RenameVolumeSpecialChar {
    fn name(&self) -> &'static str {
        "RENAME_VOL_SPECIAL_CHAR_ERROR"
    }

    fn summary(&self) -> &'static str {
        "renaming a volume to a name with a special character is rejected"
    }

    fn expectation(&self) -> Expectation {
        Expectation::Failure
    }

    fn execute(&self, ctx: &mut TestContext) -> Result<CliOutput> {
        let volume = CreateBasicVolume { test: self.name() }.provision(ctx)?;
        let new_name = ctx.config.rename.invalid_name.clone();

        ctx.note(
            LogEntry::new(EventType::CliInvoke, Severity::Info)
                .test(self.name())
                .command("volume rename")
                .details(format!("{} -> {new_name} on {}", volume.name, volume.array_name)),
        );
        ctx.cli
            .rename_volume(&volume.name, &new_name, &volume.array_name)
    }
}

/// Every test this harness knows, in listing order.
pub fn registry() -> Vec<Box<dyn SystemTest>> {
    vec![Box::new(CreateVolumeBasic), Box::new(RenameVolumeSpecialChar)]
}

/// Look a test up by name (case-insensitive, `-` and `_` interchangeable).
pub fn find_test(name: &str) -> Result<Box<dyn SystemTest>> {
    let wanted = name.replace('-', "_").to_ascii_uppercase();
    registry()
        .into_iter()
        .find(|t| t.name() == wanted)
        .ok_or_else(|| HarnessError::UnknownTest {
            name: name.to_string(),
        })
}
