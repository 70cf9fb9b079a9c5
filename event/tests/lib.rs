use approx::assert_relative_eq;
use hise_event::*;
use hise_midi::{MidiError, MidiMessage};
use proptest::prelude::*;

fn at(mut event: HiseEvent, timestamp: u32) -> HiseEvent {
    event.set_time_stamp(timestamp);
    event
}

fn tagged(timestamp: u32, tag: u16) -> HiseEvent {
    let mut e = at(HiseEvent::controller(1, 1, 0), timestamp);
    e.set_event_id(tag);
    e
}

#[test]
fn default_event_is_all_zero() {
    let zeroed: HiseEvent = unsafe { std::mem::zeroed() };
    assert_eq!(HiseEvent::default(), zeroed);
    assert!(zeroed.is_empty());

    let mut e = at(HiseEvent::note_on(1, 60, 100), 12);
    e.set_event_id(4);
    e.ignore_event(true);
    e.clear();
    assert_eq!(e, zeroed);
    e.clear();
    assert_eq!(e, zeroed);
}

#[test]
fn note_on_from_midi() {
    let e = HiseEvent::from_midi(&MidiMessage::note_on(2, 64, 90).unwrap());
    assert!(e.is_note_on());
    assert_eq!(e.channel(), 2);
    assert_eq!(e.note_number(), 64);
    assert_eq!(e.velocity(), 90);
    assert_eq!(e.event_id(), 0);
    assert_eq!(e.time_stamp(), 0);
    assert!(!e.is_artificial());
}

#[test]
fn zero_velocity_note_on_becomes_note_off() {
    let m = MidiMessage::from_bytes(&[0x90, 60, 0]).unwrap();
    assert!(HiseEvent::from(m).is_note_off());
}

#[test]
fn all_notes_off_controllers_map_to_all_notes_off() {
    let e = HiseEvent::from_midi(&MidiMessage::all_notes_off(1).unwrap());
    assert!(e.is_all_notes_off());
    assert!(!e.is_controller());

    let e = HiseEvent::from_midi(&MidiMessage::all_sound_off(1).unwrap());
    assert!(e.is_all_notes_off());

    let e = HiseEvent::from_midi(&MidiMessage::controller(1, 74, 3).unwrap());
    assert!(e.is_controller_of_type(74));
    assert_eq!(e.controller_value(), 3);
}

#[test]
fn pressure_and_bend_conversions() {
    let e = HiseEvent::from_midi(&MidiMessage::channel_pressure(1, 55).unwrap());
    assert!(e.is_channel_pressure());
    assert_eq!(e.channel_pressure_value(), 55);
    assert_eq!(e.controller_number(), AFTERTOUCH_CC_NUMBER);

    let e = HiseEvent::from_midi(&MidiMessage::pitch_wheel(1, 12000).unwrap());
    assert!(e.is_pitch_wheel());
    assert_eq!(e.pitch_wheel_value(), 12000);
    assert_eq!(e.controller_number(), PITCH_WHEEL_CC_NUMBER);
}

#[test]
fn channel_pressure_comes_back_as_aftertouch() {
    let pressure = MidiMessage::channel_pressure(4, 90).unwrap();
    let e = HiseEvent::from_midi(&pressure);
    assert!(e.is_aftertouch());
    assert_eq!(e.note_number(), 0);

    let out = e.to_midi_message().unwrap();
    assert_ne!(out, pressure);
    assert!(out.is_aftertouch());
    assert_eq!(out.channel(), 4);
    assert_eq!(out.note_number(), 0);
    assert_eq!(out.after_touch_value(), 90);
}

#[test]
fn system_messages() {
    let e = HiseEvent::from_midi(&MidiMessage::song_position(1000));
    assert!(e.is_song_position_pointer());
    assert_eq!(e.song_position_midi_beat(), 1000);
    assert_eq!(e.channel(), 0);

    assert!(HiseEvent::from_midi(&MidiMessage::midi_start()).is_midi_start());
    assert!(HiseEvent::from_midi(&MidiMessage::midi_continue()).is_midi_start());
    assert!(HiseEvent::from_midi(&MidiMessage::midi_stop()).is_midi_stop());

    let song_select = MidiMessage::from_bytes(&[0xF3, 2]).unwrap();
    assert!(HiseEvent::from_midi(&song_select).is_empty());
}

#[test]
fn midi_round_trip_applies_transpose() {
    let source = MidiMessage::note_on(3, 60, 77).unwrap();
    let mut e = HiseEvent::from_midi(&source);
    assert_eq!(e.to_midi_message(), Ok(source));

    e.set_transpose_amount(2);
    assert_eq!(e.note_number(), 60);
    assert_eq!(e.note_number_including_transpose_amount(), 62);
    assert_eq!(
        e.to_midi_message(),
        Ok(MidiMessage::note_on(3, 62, 77).unwrap())
    );

    e.set_transpose_amount(100);
    assert_eq!(e.to_midi_message().unwrap().note_number(), 127);
}

#[test]
fn engine_events_have_no_midi_form() {
    let fade = HiseEvent::create_volume_fade(3, 200, -12);
    assert_eq!(
        fade.to_midi_message(),
        Err(ConversionError::NoMidiEquivalent(EventType::VolumeFade))
    );
    assert_eq!(
        HiseEvent::EMPTY.to_midi_message(),
        Err(ConversionError::NoMidiEquivalent(EventType::Empty))
    );
    assert_eq!(
        HiseEvent::note_on(0, 60, 1).to_midi_message(),
        Err(ConversionError::Midi(MidiError::InvalidChannel(0)))
    );
}

#[test]
fn fades_and_timers() {
    let fade = HiseEvent::create_volume_fade(9, 500, -6);
    assert!(fade.is_volume_fade());
    assert!(fade.is_artificial());
    assert_eq!(fade.event_id(), 9);
    assert_eq!(fade.fade_time(), 500);
    assert_eq!(fade.gain(), -6);

    let fade = HiseEvent::create_pitch_fade(9, 100, 2, -30);
    assert!(fade.is_pitch_fade());
    assert_eq!(fade.coarse_detune(), 2);
    assert_eq!(fade.fine_detune(), -30);

    let timer = HiseEvent::create_timer_event(3, 128);
    assert!(timer.is_timer_event());
    assert_eq!(timer.timer_index(), 3);
    assert_eq!(timer.time_stamp(), 128);
}

#[test]
fn pitch_and_gain() {
    let mut e = HiseEvent::note_on(1, 69, 127);
    assert_relative_eq!(e.frequency(), 440.0);
    assert_relative_eq!(e.pitch_factor(), 1.0);

    e.set_coarse_detune(12);
    assert_relative_eq!(e.frequency(), 880.0, epsilon = 1e-9);

    e.set_coarse_detune(0);
    e.set_fine_detune(100);
    assert_relative_eq!(e.pitch_factor(), 2f64.powf(1.0 / 12.0), epsilon = 1e-12);

    e.set_gain(50);
    assert_eq!(e.gain(), 36);
    e.set_gain(-500);
    assert_eq!(e.gain(), -100);
    assert_relative_eq!(e.gain_factor(), 0.0);
    e.set_gain(0);
    assert_relative_eq!(e.gain_factor(), 1.0);
    assert_relative_eq!(e.float_velocity(), 1.0);
}

#[test]
fn matches_midi_data_ignores_id_and_time() {
    let mut a = at(HiseEvent::note_on(1, 60, 100), 4);
    a.set_event_id(10);
    let b = at(HiseEvent::note_on(1, 60, 100), 90);
    assert!(a.matches_midi_data(&b));
    assert_ne!(a, b);

    let mut c = HiseEvent::note_on(1, 58, 100);
    c.set_transpose_amount(2);
    assert!(a.matches_midi_data(&c));
}

#[test]
fn time_stamp_saturates_at_zero() {
    let mut e = at(HiseEvent::note_on(1, 60, 1), 5);
    e.add_to_time_stamp(-10);
    assert_eq!(e.time_stamp(), 0);
    e.add_to_time_stamp(7);
    assert_eq!(e.time_stamp(), 7);
}

#[test]
fn raster_ties_round_up_and_clamp_to_max() {
    let mut e = at(HiseEvent::note_on(1, 60, 1), 4);
    e.align_to_raster::<8>(100);
    assert_eq!(e.time_stamp(), 8);

    e.set_time_stamp(3);
    e.align_to_raster::<8>(100);
    assert_eq!(e.time_stamp(), 0);

    e.set_time_stamp(62);
    e.align_to_raster::<8>(64);
    assert_eq!(e.time_stamp(), 56);

    e.set_time_stamp(33);
    e.align_to_raster::<1>(64);
    assert_eq!(e.time_stamp(), 33);
}

#[test]
fn flags_and_display() {
    let mut e = HiseEvent::note_on(1, 60, 1);
    e.set_artificial();
    e.ignore_event(true);
    assert_eq!(e.flags(), EventFlags::IGNORED | EventFlags::ARTIFICIAL);

    let text = e.to_string();
    assert!(text.starts_with("NoteOn"));
    assert!(text.contains("artificial"));
    assert!(text.contains("ignored"));

    e.ignore_event(false);
    assert!(!e.is_ignored());
    assert_eq!(e.type_as_str(), "NoteOn");
}

#[test]
fn swap_and_clear_all() {
    let mut a = HiseEvent::note_on(1, 60, 1);
    let mut b = HiseEvent::note_off(1, 60, 1);
    a.swap_with(&mut b);
    assert!(a.is_note_off());
    assert!(b.is_note_on());

    let mut events = [a, b];
    HiseEvent::clear_all(&mut events);
    assert!(events.iter().all(HiseEvent::is_empty));
}

#[test]
fn buffer_drops_events_beyond_capacity() {
    let mut buffer = HiseEventBuffer::new();
    let mut num_added = 0;

    for i in 0..300 {
        if buffer.add_event(tagged(i, i as u16)) {
            num_added += 1;
        }
    }

    assert_eq!(num_added, HISE_EVENT_BUFFER_SIZE);
    assert_eq!(buffer.num_used(), HISE_EVENT_BUFFER_SIZE);
    assert!(buffer.is_full());
    assert_eq!(buffer[255].event_id(), 255);
}

#[test]
fn equal_timestamps_keep_arrival_order() {
    let mut buffer = HiseEventBuffer::new();
    let mut first_on = at(HiseEvent::note_on(1, 60, 100), 10);
    first_on.set_event_id(1);
    let off = at(HiseEvent::note_off(1, 60, 0), 5);
    let mut second_on = at(HiseEvent::note_on(1, 64, 100), 10);
    second_on.set_event_id(2);

    buffer.add_event(first_on);
    buffer.add_event(off);
    buffer.add_event(second_on);

    assert_eq!(buffer.as_slice(), &[off, first_on, second_on]);
    assert!(buffer.time_stamps_are_sorted());
    assert_eq!(buffer.min_time_stamp(), Some(5));
    assert_eq!(buffer.max_time_stamp(), Some(10));
}

#[test]
fn empty_buffer_has_no_time_stamps() {
    let mut buffer = HiseEventBuffer::new();
    assert_eq!(buffer.min_time_stamp(), None);
    assert_eq!(buffer.max_time_stamp(), None);
    assert!(buffer.time_stamps_are_sorted());

    buffer.clear();
    buffer.clear();
    assert!(buffer.is_empty());
    assert_eq!(buffer, HiseEventBuffer::default());
}

#[test]
fn get_and_pop_events() {
    let mut buffer = HiseEventBuffer::new();
    for i in 0..4 {
        buffer.add_event(tagged(i, i as u16));
    }

    assert!(buffer.get_event(10).is_empty());
    assert!(buffer.pop_event(10).is_empty());

    let popped = buffer.pop_event(1);
    assert_eq!(popped.event_id(), 1);
    assert_eq!(buffer.len(), 3);
    let ids: Vec<u16> = buffer.iter().map(HiseEvent::event_id).collect();
    assert_eq!(ids, vec![0, 2, 3]);
    assert!(buffer.get_event(3).is_empty());
}

#[test]
fn midi_block_is_appended_unsorted() {
    let mut buffer = HiseEventBuffer::new();
    let messages = vec![
        (20, MidiMessage::note_on(1, 60, 100).unwrap()),
        (4, MidiMessage::controller(1, 1, 64).unwrap()),
        (8, MidiMessage::from_bytes(&[0xF8]).unwrap()),
    ];

    assert_eq!(buffer.add_midi_events(messages), 2);
    assert_eq!(buffer.len(), 2);
    assert!(!buffer.time_stamps_are_sorted());
    assert_eq!(buffer.min_time_stamp(), Some(4));

    buffer.sort_timestamps();
    assert!(buffer.time_stamps_are_sorted());
    assert!(buffer[0].is_controller());
    assert!(buffer[1].is_note_on());
    assert_eq!(buffer[1].time_stamp(), 20);
}

#[test]
fn add_midi_event_sets_the_time_stamp() {
    let mut buffer = HiseEventBuffer::new();
    assert!(buffer.add_midi_event(&MidiMessage::note_on(1, 60, 100).unwrap(), 17));
    assert!(!buffer.add_midi_event(&MidiMessage::from_bytes(&[0xF8]).unwrap(), 2));
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer[0].time_stamp(), 17);
}

#[test]
fn add_events_and_copy_from() {
    let mut a = HiseEventBuffer::new();
    let mut b = HiseEventBuffer::new();
    a.add_event(tagged(10, 1));
    b.add_event(tagged(2, 2));
    b.add_event(tagged(3, 3));

    assert_eq!(a.add_events(&b), 2);
    assert_eq!(a.len(), 3);

    let mut c = HiseEventBuffer::new();
    c.add_event(tagged(0, 9));
    c.add_event(tagged(1, 9));
    c.add_event(tagged(2, 9));
    c.add_event(tagged(3, 9));
    c.copy_from(&b);
    assert_eq!(c, b);
    assert!(c.get_event(2).is_empty());
}

#[test]
fn moving_events_between_buffers() {
    let mut source = HiseEventBuffer::new();
    for (i, t) in [0, 5, 10, 15, 20].iter().enumerate() {
        source.add_event(tagged(*t, i as u16));
    }

    let mut below = HiseEventBuffer::new();
    source.move_events_below(&mut below, 10);
    let ids: Vec<u16> = below.iter().map(HiseEvent::event_id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(source.len(), 3);

    let mut above = HiseEventBuffer::new();
    source.move_events_above(&mut above, 15);
    let ids: Vec<u16> = above.iter().map(HiseEvent::event_id).collect();
    assert_eq!(ids, vec![3, 4]);
    assert_eq!(source.len(), 1);
    assert_eq!(source[0].event_id(), 2);
}

#[test]
fn moving_into_a_nearly_full_buffer_keeps_the_rest() {
    let mut target = HiseEventBuffer::new();
    for i in 0..254 {
        target.add_event(tagged(200, i as u16));
    }

    let mut source = HiseEventBuffer::new();
    for i in 0..5 {
        source.add_event(tagged(i, 1000 + i as u16));
    }

    source.move_events_below(&mut target, 100);

    assert_eq!(source.len() + target.len(), 259);
    assert!(target.is_full());
    let kept: Vec<u16> = source.iter().map(HiseEvent::event_id).collect();
    assert_eq!(kept, vec![1002, 1003, 1004]);
    assert_eq!(target[0].event_id(), 1000);
    assert_eq!(target[1].event_id(), 1001);
    assert!(source.get_event(3).is_empty());

    source.move_events_above(&mut target, 0);
    assert_eq!(source.len(), 3);
}

#[test]
fn timestamp_arithmetic() {
    let mut buffer = HiseEventBuffer::new();
    buffer.add_event(tagged(3, 0));
    buffer.add_event(tagged(10, 1));

    buffer.subtract_from_time_stamps(5);
    assert_eq!(buffer[0].time_stamp(), 0);
    assert_eq!(buffer[1].time_stamp(), 5);

    buffer.multiply_timestamps(3);
    assert_eq!(buffer[1].time_stamp(), 15);

    buffer.align_events_to_raster::<8>(64);
    assert_eq!(buffer[1].time_stamp(), 16);
}

#[test]
fn cursor_skips_ignored_and_artificial_events() {
    let mut buffer = HiseEventBuffer::new();
    let mut ignored = tagged(1, 1);
    ignored.ignore_event(true);
    let mut artificial = tagged(2, 2);
    artificial.set_artificial();
    buffer.add_event(tagged(0, 0));
    buffer.add_event(ignored);
    buffer.add_event(artificial);
    buffer.add_event(tagged(3, 3));

    let mut cursor = buffer.cursor();
    assert_eq!(cursor.next_event(Skip::IGNORED).map(|(_, t)| t), Some(0));
    assert_eq!(cursor.next_event(Skip::IGNORED).map(|(_, t)| t), Some(2));
    assert_eq!(cursor.next_event(Skip::ARTIFICIAL).map(|(_, t)| t), Some(3));
    assert_eq!(cursor.next_event(Skip::empty()), None);

    let visible: Vec<u16> = buffer
        .cursor()
        .skipping(Skip::IGNORED | Skip::ARTIFICIAL)
        .map(HiseEvent::event_id)
        .collect();
    assert_eq!(visible, vec![0, 3]);
    assert_eq!(buffer.cursor().count(), 4);
}

#[test]
fn mutable_cursor_can_ignore_while_walking() {
    let mut buffer = HiseEventBuffer::new();
    for i in 0..4 {
        buffer.add_event(tagged(i, i as u16));
    }

    let mut cursor = buffer.cursor_mut();
    while let Some(e) = cursor.next_event_mut(Skip::IGNORED) {
        if e.event_id() % 2 == 1 {
            e.ignore_event(true);
        }
    }

    let mut visited = Vec::new();
    let mut cursor = buffer.cursor();
    while let Some(e) = cursor.next_event_ref(Skip::IGNORED) {
        visited.push(e.event_id());
    }
    assert_eq!(visited, vec![0, 2]);
    assert_eq!(buffer.len(), 4);
}

#[test]
fn event_stack_is_lifo_and_overwrites_top_when_full() {
    let mut stack = EventStack::new();
    assert!(stack.pop().is_empty());
    assert!(stack.peek().is_none());

    for i in 0..=EVENT_STACK_SIZE {
        stack.push(tagged(0, i as u16));
    }

    assert_eq!(stack.num_used(), EVENT_STACK_SIZE);
    assert_eq!(stack.peek().map(HiseEvent::event_id), Some(16));
    assert_eq!(stack.pop().event_id(), 16);
    assert_eq!(stack.pop().event_id(), 14);
}

#[test]
fn event_stack_lookup_by_id() {
    let mut stack = EventStack::new();
    for i in 1..=4 {
        stack.push(tagged(0, i));
    }

    assert_eq!(stack.peek_note_on_for_event_id(2).map(|e| e.event_id()), Some(2));
    assert_eq!(stack.len(), 4);

    assert_eq!(stack.pop_note_on_for_event_id(2).map(|e| e.event_id()), Some(2));
    assert_eq!(stack.pop_note_on_for_event_id(2), None);
    assert_eq!(stack.len(), 3);
    assert_eq!(stack.pop().event_id(), 4);
    assert_eq!(stack.pop().event_id(), 3);
    assert_eq!(stack.pop().event_id(), 1);

    stack.push(tagged(0, 1));
    if let Some(top) = stack.peek_mut() {
        top.set_velocity(12);
    }
    assert_eq!(stack.pop().velocity(), 12);
    stack.push(tagged(0, 1));
    stack.clear();
    assert!(stack.is_empty());
}

#[test]
fn unordered_stack_rejects_when_full() {
    let mut stack = UnorderedStack::<u32, 4>::new();
    assert!(stack.insert(1));
    assert!(!stack.insert(1));
    assert!(stack.insert_without_search(2));
    assert!(stack.insert_without_search(3));
    assert!(stack.insert_without_search(4));
    assert!(stack.is_full());
    assert!(!stack.insert_without_search(5));
    assert_eq!(stack.capacity(), 4);

    assert!(stack.remove(&1));
    assert!(!stack.contains(&1));
    assert_eq!(stack[0], 4);
    assert_eq!(stack.remove_element(7), None);
    assert_eq!(stack.remove_first_where(|&e| e > 2), Some(4));
    assert_eq!(stack.len(), 2);

    stack.clear();
    assert!(stack.is_empty());
}

#[test]
fn split_hands_each_sub_block_its_events() {
    let mut events = HiseEventBuffer::new();
    events.add_event(tagged(0, 0));
    events.add_event(tagged(5, 1));
    events.add_event(tagged(17, 2));
    events.add_event(tagged(40, 3));

    let mut scratch = HiseEventBuffer::new();
    let mut seen = Vec::new();

    run_split_at_raster(&mut events, &mut scratch, 32, 16, |block, sub| {
        for e in sub.iter() {
            seen.push((block.start, e.event_id(), e.time_stamp()));
        }
    });

    assert_eq!(seen, vec![(0, 0, 0), (0, 1, 5), (16, 2, 1)]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].time_stamp(), 8);
}

#[test]
fn split_handles_a_short_last_block() {
    let mut events = HiseEventBuffer::new();
    events.add_event(tagged(19, 0));
    let mut scratch = HiseEventBuffer::new();
    let mut blocks = Vec::new();

    run_split_at_raster(&mut events, &mut scratch, 20, 8, |block, sub| {
        blocks.push((block, sub.len()));
    });

    assert_eq!(
        blocks,
        vec![
            (SubBlock { start: 0, len: 8 }, 0),
            (SubBlock { start: 8, len: 8 }, 0),
            (SubBlock { start: 16, len: 4 }, 1),
        ]
    );
    assert!(events.is_empty());
}

fn stable_sorted(timestamps: &[u32]) -> Vec<(u32, u16)> {
    let mut expected: Vec<(u32, u16)> = timestamps
        .iter()
        .enumerate()
        .map(|(i, &t)| (t, i as u16))
        .collect();
    expected.sort_by_key(|&(t, _)| t);
    expected
}

fn contents(buffer: &HiseEventBuffer) -> Vec<(u32, u16)> {
    buffer
        .iter()
        .map(|e| (e.time_stamp(), e.event_id()))
        .collect()
}

proptest! {
    #[test]
    fn proptest_add_event_keeps_buffer_sorted_and_stable(
        timestamps in prop::collection::vec(0..64u32, 0..200)
    ) {
        let mut buffer = HiseEventBuffer::new();
        for (i, &t) in timestamps.iter().enumerate() {
            assert!(buffer.add_event(tagged(t, i as u16)));
        }

        assert!(buffer.time_stamps_are_sorted());
        assert_eq!(contents(&buffer), stable_sorted(&timestamps));
    }

    #[test]
    fn proptest_sort_matches_stable_sort(
        timestamps in prop::collection::vec(0..64u32, 0..200)
    ) {
        let messages = timestamps
            .iter()
            .map(|&t| (t, MidiMessage::controller(1, 1, 0).unwrap()));

        let mut buffer = HiseEventBuffer::new();
        buffer.add_midi_events(messages);
        for (i, e) in buffer.iter_mut().enumerate() {
            e.set_event_id(i as u16);
        }

        buffer.sort_timestamps();
        assert_eq!(contents(&buffer), stable_sorted(&timestamps));
    }

    #[test]
    fn proptest_raster_alignment_stays_in_range(timestamp in 0..4096u32, max in 1..4096u32) {
        prop_assume!(timestamp < max);

        let mut e = at(HiseEvent::note_on(1, 60, 1), timestamp);
        e.align_to_raster::<16>(max);
        let aligned = e.time_stamp();

        assert_eq!(aligned % 16, 0);
        assert!(aligned < max);
        assert!(aligned.abs_diff(timestamp) <= 16);
    }

    #[test]
    fn proptest_split_delivers_every_event_once(
        timestamps in prop::collection::vec(0..256u32, 0..100),
        raster in 1..64u32,
    ) {
        let num_samples = 128;
        let mut events = HiseEventBuffer::new();
        for (i, &t) in timestamps.iter().enumerate() {
            events.add_event(tagged(t, i as u16));
        }

        let mut scratch = HiseEventBuffer::new();
        let mut delivered = Vec::new();
        run_split_at_raster(&mut events, &mut scratch, num_samples, raster, |block, sub| {
            for e in sub.iter() {
                assert!(e.time_stamp() < block.len);
                delivered.push((block.start + e.time_stamp(), e.event_id()));
            }
        });

        let due: Vec<(u32, u16)> = stable_sorted(&timestamps)
            .into_iter()
            .filter(|&(t, _)| t < num_samples)
            .collect();
        assert_eq!(delivered, due);

        for e in events.iter() {
            assert_eq!(e.time_stamp() + num_samples, timestamps[e.event_id() as usize]);
        }
        assert_eq!(events.len() + delivered.len(), timestamps.len());
    }
}
