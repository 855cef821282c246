//! Interleaves captured microphone samples with the synthesized reference.
//!
//! A frame is a run of groups. Each group holds `mic_channels` microphone
//! samples in channel order, followed by one reference slot when the layout
//! carries one.

use crate::error::CodecError;
use crate::reference::ReferenceBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub mic_channels: usize,
    pub reference_slot: bool,
}

impl FrameLayout {
    pub fn new(mic_channels: usize, reference_slot: bool) -> Self {
        Self {
            mic_channels,
            reference_slot,
        }
    }

    /// Slots per time-aligned group.
    pub fn group_width(&self) -> usize {
        self.mic_channels + usize::from(self.reference_slot)
    }

    /// Number of groups in a frame of `total_slots`.
    pub fn groups_for(&self, total_slots: usize) -> Result<usize, CodecError> {
        if self.mic_channels == 0 {
            return Err(CodecError::InvalidLayout);
        }
        let group_width = self.group_width();
        if total_slots % group_width != 0 {
            return Err(CodecError::Misaligned {
                slots: total_slots,
                group_width,
            });
        }
        Ok(total_slots / group_width)
    }
}

/// Builds interleaved groups into `dest`.
///
/// Only complete groups are written, and never more than `mic` can fill, so a
/// short capture shows up as a smaller return value instead of made-up
/// microphone data. With `reference` absent the reference slot is silence.
///
/// Returns the number of slots written.
pub fn assemble(
    dest: &mut [i16],
    mic: &[i16],
    layout: FrameLayout,
    mut reference: Option<&mut ReferenceBuffer>,
) -> usize {
    let channels = layout.mic_channels;
    if channels == 0 {
        return 0;
    }
    let width = layout.group_width();
    let groups = (dest.len() / width).min(mic.len() / channels);

    for (group, captured) in dest
        .chunks_exact_mut(width)
        .zip(mic.chunks_exact(channels))
        .take(groups)
    {
        group[..channels].copy_from_slice(captured);
        if layout.reference_slot {
            group[channels] = reference.as_deref_mut().map_or(0, ReferenceBuffer::drain);
        }
    }

    groups * width
}
