//! Shared "create basic volume" fixture: bring up the array and provision one
//! volume of a known name on it.

use crate::array::cli::CliOutput;
use crate::core::errors::{HarnessError, Result};
use crate::harness::context::TestContext;
use crate::logger::jsonl::{EventType, LogEntry, Severity};

/// Volume the fixture guarantees exists after [`CreateBasicVolume::provision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeReference {
    /// Volume name.
    pub name: String,
    /// Array the volume lives on.
    pub array_name: String,
}

/// Fixture that mounts the configured array and creates the baseline volume.
#[derive(Debug, Clone, Copy)]
pub struct CreateBasicVolume<'a> {
    /// Test the fixture runs on behalf of; used to tag log entries.
    pub test: &'a str,
}

impl CreateBasicVolume<'_> {
    /// Start (if configured), create the buffer device, scan, create and mount
    /// the array. Any step the array rejects aborts with [`HarnessError::Fixture`].
    pub fn prepare_array(&self, ctx: &mut TestContext) -> Result<()> {
        ctx.note(
            LogEntry::new(EventType::FixtureStep, Severity::Info)
                .test(self.test)
                .details(format!("array {} launch={}", ctx.config.array.name, ctx.config.array.launch)),
        );
        ctx.lifecycle.ensure_running()?;

        let array = ctx.config.array.clone();
        if array.buffer_num_blocks > 0 {
            let out = ctx.cli.create_buffer_device(
                &array.buffer,
                array.buffer_num_blocks,
                array.buffer_block_size,
            )?;
            self.require_success(ctx, "device create", &out)?;
        }

        let out = ctx.cli.scan_devices()?;
        self.require_success(ctx, "device scan", &out)?;

        let out = ctx.cli.create_array(
            &array.name,
            &array.buffer,
            &array.data_devices,
            &array.spare_devices,
            &array.raid_type,
        )?;
        self.require_success(ctx, "array create", &out)?;

        let out = ctx.cli.mount_array(&array.name)?;
        self.require_success(ctx, "array mount", &out)
    }

    /// Issue `volume create` for the configured volume without judging it.
    pub fn create_volume(&self, ctx: &mut TestContext) -> Result<CliOutput> {
        let volume = ctx.config.volume.clone();
        ctx.note(
            LogEntry::new(EventType::CliInvoke, Severity::Info)
                .test(self.test)
                .command("volume create")
                .details(volume.name.clone()),
        );
        ctx.cli.create_volume(
            &volume.name,
            &volume.size,
            volume.max_iops,
            volume.max_bw,
            &ctx.config.array.name,
        )
    }

    /// Full fixture: array up and mounted, baseline volume created.
    pub fn provision(&self, ctx: &mut TestContext) -> Result<VolumeReference> {
        self.prepare_array(ctx)?;
        let out = self.create_volume(ctx)?;
        self.require_success(ctx, "volume create", &out)?;
        Ok(VolumeReference {
            name: ctx.config.volume.name.clone(),
            array_name: ctx.config.array.name.clone(),
        })
    }

    fn require_success(
        &self,
        ctx: &mut TestContext,
        step: &'static str,
        out: &CliOutput,
    ) -> Result<()> {
        let status = out.status()?;
        ctx.note_response(self.test, step, status.code, &status.description);
        if status.is_success() {
            Ok(())
        } else {
            Err(HarnessError::Fixture {
                step,
                code: status.code,
                description: status.description,
            })
        }
    }
}
