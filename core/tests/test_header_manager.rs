// Segment header manager driven directly against an in-memory target.

#[cfg(test)]
mod tests {
    use metasink_core::constants::HEADER_FIXED_SIZE;
    use metasink_core::headers::{decode_header_le, AttrValue, ExtraAttributes, RxTime};
    use metasink_core::prelude::*;
    use metasink_core::sink::{OutputTarget, SegmentHeaderManager};

    fn setup(cfg: SinkConfig) -> (SegmentHeaderManager, OutputTarget, MemorySink) {
        let mem = MemorySink::new();
        let target = OutputTarget::open(Destination::Memory(mem.clone()), cfg.split_header).unwrap();
        (SegmentHeaderManager::new(&cfg).unwrap(), target, mem)
    }

    #[test]
    fn first_header_reflects_config() {
        let cfg = SinkConfig::new(2, 48_000.0, 100)
            .with_relative_rate(2.0)
            .with_sample_type(SampleType::Short, true)
            .with_start_time(RxTime::new(9, 0.125));
        let (mgr, _target, _mem) = setup(cfg);

        let h = mgr.header();
        assert_eq!(h.item_size, 2);
        assert_eq!(h.sample_rate, 96_000.0);
        assert_eq!(h.sample_type, SampleType::Short);
        assert!(h.is_complex);
        assert_eq!(h.rx_time, RxTime::new(9, 0.125));
        assert_eq!(h.segment_start_offset, (HEADER_FIXED_SIZE + mgr.extra_size()) as u64);
        assert!(mgr.slot().is_none());
    }

    #[test]
    fn emit_then_finalize_patches_in_place() {
        let (mut mgr, mut target, mem) = setup(SinkConfig::new(4, 100.0, 10));

        let slot = mgr.emit_new(&mut target).unwrap();
        assert_eq!(slot.offset, 0);
        assert_eq!(slot.len, HEADER_FIXED_SIZE + 8);

        target.write_data(&[0u8; 12], 4).unwrap();
        let (old, new) = mgr.close_segment(&mut target, 3).unwrap();
        assert_eq!(old, new);
        assert!(!mgr.has_open_header());

        let bytes = mem.data_bytes();
        assert_eq!(bytes.len(), slot.len + 12);
        let h = decode_header_le(&bytes).unwrap();
        assert_eq!(h.segment_byte_length, 12);
        assert_eq!(h.rx_time, RxTime::default());

        // The in-memory header has moved on by 3 records at 100/s.
        assert!((mgr.header().rx_time.as_secs_f64() - 0.03).abs() < 1e-12);
        assert_eq!(mgr.timebase().now(), mgr.header().rx_time);
    }

    #[test]
    fn finalize_without_emit_is_rejected() {
        let (mut mgr, mut target, _mem) = setup(SinkConfig::new(4, 100.0, 10));
        assert!(matches!(mgr.finalize_current(&mut target, 0), Err(SinkError::Validation(_))));
    }

    #[test]
    fn extras_update_on_empty_segment_resizes_tail() {
        let (mut mgr, mut target, mem) = setup(SinkConfig::new(4, 100.0, 10));
        let slot = mgr.emit_new(&mut target).unwrap();

        mgr.apply_attribute_update("label", AttrValue::from("north")).unwrap();
        let (old, new) = mgr.finalize_current(&mut target, 0).unwrap();
        assert_eq!(old, slot.len);
        assert!(new > old);
        assert_eq!(mem.data_bytes().len(), new);

        let bytes = mem.data_bytes();
        let h = decode_header_le(&bytes).unwrap();
        let extras = ExtraAttributes::parse(&bytes[HEADER_FIXED_SIZE..h.segment_start_offset as usize]).unwrap();
        assert_eq!(extras.get("label"), Some(&AttrValue::Str("north".into())));
    }

    #[test]
    fn extras_growth_behind_data_is_refused() {
        let (mut mgr, mut target, mem) = setup(SinkConfig::new(4, 100.0, 10));
        mgr.emit_new(&mut target).unwrap();
        target.write_data(&[1, 2, 3, 4], 4).unwrap();
        let before = mem.data_bytes();

        mgr.apply_attribute_update("label", AttrValue::from("south")).unwrap();
        let err = mgr.finalize_current(&mut target, 4).unwrap_err();
        assert!(matches!(err, SinkError::Format(_)));
        assert_eq!(mem.data_bytes(), before);
    }

    #[test]
    fn fixed_field_updates() {
        let (mut mgr, _target, _mem) = setup(SinkConfig::new(4, 100.0, 10).with_relative_rate(0.5));

        mgr.apply_attribute_update("rx_rate", AttrValue::Double(400.0)).unwrap();
        assert_eq!(mgr.header().sample_rate, 200.0);
        assert_eq!(mgr.timebase().sample_rate(), 400.0);

        mgr.apply_attribute_update("rx_time", AttrValue::Time(5, 0.5)).unwrap();
        assert_eq!(mgr.header().rx_time, RxTime::new(5, 0.5));

        mgr.apply_attribute_update("type", AttrValue::UInt(SampleType::Double as u64)).unwrap();
        assert_eq!(mgr.header().sample_type, SampleType::Double);

        mgr.apply_attribute_update("size", AttrValue::UInt(4)).unwrap();
        assert!(mgr.extras().is_empty());
    }

    #[test]
    fn invalid_updates_change_nothing() {
        let (mut mgr, _target, _mem) = setup(SinkConfig::new(4, 100.0, 10));
        let before = mgr.header().clone();

        assert!(matches!(
            mgr.apply_attribute_update("bytes", AttrValue::UInt(1)),
            Err(AttributeError::Reserved { .. })
        ));
        assert!(matches!(
            mgr.apply_attribute_update("type", AttrValue::UInt(77)),
            Err(AttributeError::OutOfRange { .. })
        ));
        assert!(matches!(
            mgr.apply_attribute_update("version", AttrValue::UInt(0)),
            Err(AttributeError::OutOfRange { .. })
        ));
        assert!(matches!(
            mgr.apply_attribute_update("cplx", AttrValue::Double(1.0)),
            Err(AttributeError::TypeMismatch { expected: "bool", got: "double", .. })
        ));

        assert_eq!(mgr.header(), &before);
        assert!(mgr.extras().is_empty());
    }

    #[test]
    fn release_slot_forgets_target() {
        let (mut mgr, mut target, _mem) = setup(SinkConfig::new(4, 100.0, 10));
        mgr.emit_new(&mut target).unwrap();
        assert!(mgr.slot().is_some());
        mgr.release_slot();
        assert!(mgr.slot().is_none());
    }
}
