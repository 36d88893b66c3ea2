//! Resume Memory Reservation
//!
//! Before the S3 data is written, the save path reserves the high memory areas the resume path will run in, so the
//! OS does not reuse them while the platform sleeps. The reservation itself is platform bookkeeping (typically an
//! entry in the firmware's memory table) and is provided through [`ResumeMemoryReservation`].
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!
use r_efi::efi;

use crate::config::S3DataConfig;

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

/// Memory areas needed by the resume path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationId {
    /// Stack used by the early resume phase once memory is initialized.
    RomstageStack,
    /// Scratch space used while resuming.
    ResumeScratch,
}

impl ReservationId {
    /// Number of reservation ids.
    pub const COUNT: usize = 2;

    /// Every reservation id, in the order reservations are made.
    pub const ALL: [ReservationId; ReservationId::COUNT] = [ReservationId::RomstageStack, ReservationId::ResumeScratch];

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

/// Sizes of the memory areas to reserve during save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResumeReservations {
    sizes: [u32; ReservationId::COUNT],
}

impl ResumeReservations {
    /// Takes the reservation sizes from the configuration.
    pub const fn from_config(config: &S3DataConfig) -> Self {
        Self { sizes: [config.romstage_stack_size, config.resume_scratch_size] }
    }

    /// Size to reserve for `id`. Zero means no reservation.
    pub const fn size(&self, id: ReservationId) -> u32 {
        self.sizes[id.index()]
    }

    /// Iterates over the reservations that have a non-zero size.
    pub fn iter(&self) -> impl Iterator<Item = (ReservationId, u32)> + '_ {
        ReservationId::ALL.into_iter().map(move |id| (id, self.size(id))).filter(|(_, size)| *size != 0)
    }
}

/// Platform bookkeeping for memory the resume path depends on.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait ResumeMemoryReservation {
    /// Reserves `size` bytes for `id`.
    fn reserve(&mut self, id: ReservationId, size: u32) -> Result<(), efi::Status>;
}

/// Reservation provider for platforms that do not reserve resume memory.
///
/// Every request is rejected as unsupported, so a configuration that asks for reservations is reported in the save
/// report rather than silently ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReservation;

impl ResumeMemoryReservation for NoReservation {
    fn reserve(&mut self, _id: ReservationId, _size: u32) -> Result<(), efi::Status> {
        Err(efi::Status::UNSUPPORTED)
    }
}
