// Rotation and detach:
// * requests take effect at the next batch boundary only
// * the outgoing target's last header covers everything written to it
// * last request wins; open failures leave the active target alone

mod common;

#[cfg(test)]
mod tests {
    use std::thread;

    use metasink_core::prelude::*;

    use crate::common::*;

    #[test]
    fn rotation_waits_for_next_batch() {
        let (mut sink, first) = memory_sink(basic_config(100));
        let second = MemorySink::new();

        sink.work(&records(5, 4), &[]).unwrap();
        sink.request_rotation(Destination::Memory(second.clone())).unwrap();

        // Nothing moves until the writer sees another batch.
        assert!(second.data_bytes().is_empty());
        let open = decode_header_le(&first.data_bytes()).unwrap();
        assert_eq!(open.segment_byte_length, 0);

        sink.work(&records(7, 4), &[]).unwrap();
        sink.shutdown().unwrap();

        let old = walk_combined(&first.data_bytes());
        assert_eq!(byte_lengths(&old), vec![20]);
        assert_eq!(concat_data(&old), records(5, 4));

        let new = walk_combined(&second.data_bytes());
        assert_eq!(byte_lengths(&new), vec![28]);
        assert!(approx(new[0].meta.rx_time.as_secs_f64(), 0.005));
        assert_eq!(sink.counters().rotations, 1);
    }

    #[test]
    fn rotation_from_another_thread() {
        let (mut sink, first) = memory_sink(basic_config(10));
        let second = MemorySink::new();
        let handle = sink.rotation_handle();

        sink.work(&records(12, 4), &[]).unwrap();

        let dest = Destination::Memory(second.clone());
        thread::spawn(move || handle.request_rotation(dest))
            .join()
            .unwrap()
            .unwrap();

        sink.work(&records(3, 4), &[]).unwrap();
        sink.shutdown().unwrap();

        assert_eq!(byte_lengths(&walk_combined(&first.data_bytes())), vec![40, 8]);
        assert_eq!(byte_lengths(&walk_combined(&second.data_bytes())), vec![12]);
    }

    #[test]
    fn last_rotation_request_wins() {
        let (mut sink, _first) = memory_sink(basic_config(100));
        let skipped = MemorySink::new();
        let chosen = MemorySink::new();

        sink.request_rotation(Destination::Memory(skipped.clone())).unwrap();
        sink.request_rotation(Destination::Memory(chosen.clone())).unwrap();
        sink.work(&records(4, 4), &[]).unwrap();
        sink.shutdown().unwrap();

        assert!(skipped.data_bytes().is_empty());
        assert_eq!(byte_lengths(&walk_combined(&chosen.data_bytes())), vec![16]);
        assert_eq!(sink.counters().rotations, 1);
    }

    #[test]
    fn detach_drops_until_next_rotation() {
        let (mut sink, first) = memory_sink(basic_config(100));
        sink.work(&records(6, 4), &[]).unwrap();

        sink.request_close().unwrap();
        assert_eq!(sink.work(&records(9, 4), &[]).unwrap(), 9);
        assert!(!sink.is_active());
        assert_eq!(sink.counters().records_dropped, 9);
        assert_eq!(byte_lengths(&walk_combined(&first.data_bytes())), vec![24]);

        let second = MemorySink::new();
        sink.request_rotation(Destination::Memory(second.clone())).unwrap();
        sink.work(&records(2, 4), &[]).unwrap();
        sink.shutdown().unwrap();

        assert_eq!(byte_lengths(&walk_combined(&second.data_bytes())), vec![8]);
        assert_eq!(sink.items_read(), 17);
    }

    #[test]
    fn attribute_update_while_detached_reaches_next_target() {
        let (mut sink, _first) = memory_sink(basic_config(100));
        sink.request_close().unwrap();
        sink.work(&records(1, 4), &[]).unwrap();

        sink.update_attribute("site", "lab").unwrap();

        let second = MemorySink::new();
        sink.request_rotation(Destination::Memory(second.clone())).unwrap();
        sink.work(&records(2, 4), &[]).unwrap();
        sink.shutdown().unwrap();

        let segs = walk_combined(&second.data_bytes());
        assert_eq!(segs[0].extras.get("site"), Some(&AttrValue::Str("lab".into())));
    }

    #[test]
    fn failed_open_keeps_active_target() {
        let dir = tempfile::tempdir().unwrap();
        let (mut sink, first) = memory_sink(basic_config(100));

        let bad = dir.path().join("missing").join("out.dat");
        let err = sink.request_rotation(Destination::file(bad)).unwrap_err();
        assert!(matches!(err, SinkError::Open { .. }));

        sink.work(&records(3, 4), &[]).unwrap();
        sink.shutdown().unwrap();
        assert_eq!(byte_lengths(&walk_combined(&first.data_bytes())), vec![12]);
        assert_eq!(sink.counters().rotations, 0);
    }
}
