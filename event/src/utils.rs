use crate::buffer::HiseEventBuffer;

/// A slice of the current block, in samples from the block start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubBlock {
    pub start: u32,
    pub len: u32,
}

/// Splits a block of `num_samples` into sub-blocks of `raster` samples (the
/// last one may be shorter) and calls `f` once per sub-block with the events
/// due inside it.
///
/// The events handed to `f` are moved out of `events` into `scratch` and
/// rebased to the sub-block start. Whatever is left in `events` afterwards
/// lies past the block and is rebased by `num_samples` for the next one.
pub fn run_split_at_raster<F>(
    events: &mut HiseEventBuffer,
    scratch: &mut HiseEventBuffer,
    num_samples: u32,
    raster: u32,
    mut f: F,
) where
    F: FnMut(SubBlock, &mut HiseEventBuffer),
{
    debug_assert!(raster > 0);
    let raster = raster.max(1);

    let mut start = 0;
    while start < num_samples {
        let len = raster.min(num_samples - start);

        scratch.clear();
        events.move_events_below(scratch, start + len);
        scratch.subtract_from_time_stamps(start);

        f(SubBlock { start, len }, scratch);

        start += len;
    }

    events.subtract_from_time_stamps(num_samples);
}
