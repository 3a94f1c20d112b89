use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config::{PipeOptions, StreamOptions, TransformOptions, WritableOptions};
use crate::engine::{
    BufferState, Emitter, Event, EventKind, Readable, Scheduler, TaskQueue, TokioScheduler,
    Transform, TransformOutput, Writable, WriteCallback, WriteTarget,
};
use crate::errors::StreamError;
use crate::traits::{
    source_fn, transform_fn, IterSource, PassThrough, PullCallback, Pulled, Sink, StepCallback,
};

/// Cross-component scenarios: pull engine, flow loop, transform and the
/// push-side collaborator working together.
#[cfg(test)]
mod tests {
    use super::*;

    /// Sink that records every write and can be told to push back once.
    #[derive(Default)]
    struct RecordingSink {
        chunks: RefCell<Vec<Vec<u8>>>,
        ends: Cell<usize>,
        block_at: Cell<Option<usize>>,
        events: Emitter<Vec<u8>>,
    }

    impl RecordingSink {
        fn new() -> Rc<Self> {
            Rc::new(Self::default())
        }

        /// Answer `false` to the `n`th write (1-based).
        fn blocking_at(n: usize) -> Rc<Self> {
            let sink = Self::new();
            sink.block_at.set(Some(n));
            sink
        }

        fn release(&self) {
            self.events.emit(&Event::Drain);
        }

        fn received(&self) -> Vec<Vec<u8>> {
            self.chunks.borrow().clone()
        }

        fn bytes(&self) -> Vec<u8> {
            self.chunks.borrow().concat()
        }
    }

    impl Sink<Vec<u8>> for RecordingSink {
        fn write(&self, chunk: Vec<u8>) -> bool {
            self.chunks.borrow_mut().push(chunk);
            self.block_at.get() != Some(self.chunks.borrow().len())
        }

        fn end(&self) {
            self.ends.set(self.ends.get() + 1);
        }

        fn events(&self) -> &Emitter<Vec<u8>> {
            &self.events
        }
    }

    /// Writable target collecting everything into one buffer.
    struct Collect(Rc<RefCell<Vec<u8>>>);

    impl WriteTarget<Vec<u8>> for Collect {
        fn write_chunk(&self, chunk: Vec<u8>, done: WriteCallback) {
            self.0.borrow_mut().extend(chunk);
            done(Ok(()));
        }
    }

    fn numbered(count: u8) -> Vec<Vec<u8>> {
        (0..count).map(|i| vec![i]).collect()
    }

    fn one_chunk_per_read() -> StreamOptions {
        StreamOptions::default().with_low_water_mark(1)
    }

    /// Source yielding `count` single-byte chunks, counting pulls.
    fn counted_source(count: u8, pulls: Rc<Cell<usize>>) -> impl crate::traits::Source<Vec<u8>> {
        let next = Cell::new(0u8);
        source_fn(move |_size, done: PullCallback<Vec<u8>>| {
            pulls.set(pulls.get() + 1);
            let i = next.get();
            if i == count {
                done(Ok(Pulled::End));
            } else {
                next.set(i + 1);
                done(Ok(Pulled::Chunk(vec![i])));
            }
        })
    }

    #[test]
    fn test_total_size_tracks_queued_chunks() {
        let mut buffer: BufferState<Vec<u8>> = BufferState::new(StreamOptions::default());
        let mut seed: u32 = 7;
        let mut next = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (seed >> 16) as usize % 17
        };

        for round in 0..500 {
            if round % 3 == 0 {
                buffer.take(next());
            } else {
                buffer.push(vec![0u8; next()]);
            }
            assert_eq!(buffer.total_size(), buffer.queued_sizes_sum());
        }
        buffer.take_all();
        assert_eq!(buffer.total_size(), 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_asynchronous_source_never_has_two_pulls_outstanding() {
        let queue = TaskQueue::new();
        let outstanding = Rc::new(Cell::new(0usize));
        let peak = Rc::new(Cell::new(0usize));
        let remaining = Rc::new(Cell::new(40u8));

        let scheduler = Rc::clone(&queue);
        let (now, max) = (Rc::clone(&outstanding), Rc::clone(&peak));
        let source = source_fn(move |_size, done: PullCallback<Vec<u8>>| {
            now.set(now.get() + 1);
            max.set(max.get().max(now.get()));
            let now = Rc::clone(&now);
            let remaining = Rc::clone(&remaining);
            scheduler.defer(Box::new(move || {
                now.set(now.get() - 1);
                if remaining.get() == 0 {
                    done(Ok(Pulled::End));
                } else {
                    remaining.set(remaining.get() - 1);
                    done(Ok(Pulled::Chunk(vec![1, 2, 3])));
                }
            }));
        });

        let stream = Readable::new(source, StreamOptions::default().with_low_water_mark(16), queue.clone());
        let sink = stream.pipe(RecordingSink::new(), PipeOptions::default());
        queue.run_until_idle();

        assert_eq!(peak.get(), 1);
        assert_eq!(sink.bytes().len(), 120);
        assert_eq!(sink.ends.get(), 1);
    }

    #[test]
    fn test_read_on_ended_empty_stream_raises_end_once() {
        let queue = TaskQueue::new();
        let stream = Readable::new(IterSource::new(numbered(2)), one_chunk_per_read(), queue.clone());
        let ends = Rc::new(Cell::new(0));
        let counter = Rc::clone(&ends);
        stream.on(EventKind::End, move |_| counter.set(counter.get() + 1));

        for _ in 0..10 {
            stream.read(None);
            queue.run_until_idle();
        }

        assert!(stream.is_ended());
        assert_eq!(ends.get(), 1);
    }

    #[test]
    fn test_short_read_below_watermark_waits_and_pulls_once() {
        let queue = TaskQueue::new();
        let pulls = Rc::new(RefCell::new(Vec::<PullCallback<Vec<u8>>>::new()));
        let parked = Rc::clone(&pulls);
        let stream = Readable::new(
            source_fn(move |_size, done: PullCallback<Vec<u8>>| parked.borrow_mut().push(done)),
            StreamOptions::default(),
            queue.clone(),
        );

        stream.read(None);
        let first = pulls.borrow_mut().remove(0);
        first(Ok(Pulled::Chunk(vec![0u8; 200])));
        // 200 < 1024 keeps the prefetch chain going.
        assert_eq!(pulls.borrow().len(), 1);
        let chained = pulls.borrow_mut().remove(0);
        chained(Ok(Pulled::Idle));
        assert!(!stream.is_pulling());

        assert_eq!(stream.read(Some(1000)), None);
        assert!(stream.is_consumer_waiting());
        assert_eq!(stream.buffered_size(), 200);
        assert_eq!(pulls.borrow().len(), 1);
        assert!(stream.is_pulling());
    }

    #[test]
    fn test_fifty_chunk_pipe_delivers_in_order_then_ends_once() {
        let queue = TaskQueue::new();
        let stream = Readable::new(IterSource::new(numbered(50)), one_chunk_per_read(), queue.clone());
        let sink = stream.pipe(RecordingSink::new(), PipeOptions::default());

        queue.run_until_idle();

        assert_eq!(sink.received(), numbered(50));
        assert_eq!(sink.ends.get(), 1);
        assert!(!stream.is_pulling());
    }

    #[test]
    fn test_backpressure_holds_the_flow_loop_until_release() {
        let queue = TaskQueue::new();
        let pulls = Rc::new(Cell::new(0));
        let stream = Readable::new(
            counted_source(50, Rc::clone(&pulls)),
            one_chunk_per_read(),
            queue.clone(),
        );
        let sink = stream.pipe(RecordingSink::blocking_at(10), PipeOptions::default());

        queue.run_until_idle();
        assert_eq!(sink.received(), numbered(10));
        assert_eq!(stream.awaiting_release(), 1);
        let pulls_while_blocked = pulls.get();

        for _ in 0..5 {
            queue.run_until_idle();
        }
        assert_eq!(pulls.get(), pulls_while_blocked);
        assert_eq!(sink.received().len(), 10);

        sink.release();
        queue.run_until_idle();
        assert_eq!(sink.received(), numbered(50));
        assert_eq!(sink.ends.get(), 1);
    }

    #[test]
    fn test_flow_resumes_only_after_every_blocked_sink_releases() {
        let queue = TaskQueue::new();
        let stream = Readable::new(IterSource::new(numbered(6)), one_chunk_per_read(), queue.clone());
        let first = stream.pipe(RecordingSink::blocking_at(2), PipeOptions::default());
        let second = stream.pipe(RecordingSink::blocking_at(2), PipeOptions::default());

        queue.run_until_idle();
        assert_eq!(stream.awaiting_release(), 2);
        assert_eq!(first.received().len(), 2);
        assert_eq!(second.received().len(), 2);

        first.release();
        // A second drain from the same sink must not count twice.
        first.release();
        queue.run_until_idle();
        assert_eq!(first.received().len(), 2);

        second.release();
        queue.run_until_idle();
        assert_eq!(first.received(), numbered(6));
        assert_eq!(second.received(), numbered(6));
    }

    #[test]
    fn test_transform_emits_are_read_together() {
        let queue = TaskQueue::new();
        let splitter = Transform::new(
            transform_fn(|chunk: Vec<u8>, output: TransformOutput<Vec<u8>>, done: StepCallback| {
                for byte in chunk {
                    output.push(vec![byte]);
                }
                done(Ok(()));
            }),
            TransformOptions::default(),
            queue.clone(),
        );

        let reads = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&reads);
        let reader = splitter.readable().clone();
        splitter.on(EventKind::Readable, move |_| {
            if let Some(chunk) = reader.read(None) {
                seen.borrow_mut().push(chunk);
            }
        });

        assert_eq!(splitter.read(None), None);
        splitter.write(b"AB".to_vec());
        splitter.write(b"CD".to_vec());
        queue.run_until_idle();

        assert_eq!(reads.borrow().first(), Some(&b"AB".to_vec()));
        let rest: Vec<u8> = reads.borrow()[1..].concat();
        let tail = splitter.read(None).unwrap_or_default();
        assert_eq!([rest, tail].concat(), b"CD".to_vec());
    }

    #[test]
    fn test_unpiped_sink_receives_nothing_more() {
        let queue = TaskQueue::new();
        let source = Transform::new(PassThrough, TransformOptions::default(), queue.clone());
        let removed = source.pipe(RecordingSink::new(), PipeOptions::default());
        let kept = source.pipe(RecordingSink::new(), PipeOptions::default());

        source.write(b"1".to_vec());
        queue.run_until_idle();
        assert!(source.unpipe(&*removed));
        source.write(b"2".to_vec());
        source.write(b"3".to_vec());
        queue.run_until_idle();

        assert_eq!(removed.bytes(), b"1".to_vec());
        assert_eq!(kept.bytes(), b"123".to_vec());
        assert_eq!(removed.events.listener_count(EventKind::Drain), 0);
    }

    #[test]
    fn test_unpipe_of_blocked_sink_releases_the_loop() {
        let queue = TaskQueue::new();
        let stream = Readable::new(IterSource::new(numbered(5)), one_chunk_per_read(), queue.clone());
        let stuck = stream.pipe(RecordingSink::blocking_at(1), PipeOptions::default());
        let other = stream.pipe(RecordingSink::new(), PipeOptions::default());

        queue.run_until_idle();
        assert_eq!(other.received().len(), 1);

        stream.unpipe(&*stuck);
        assert_eq!(stream.awaiting_release(), 0);
        queue.run_until_idle();

        assert_eq!(other.received(), numbered(5));
        assert_eq!(stuck.received().len(), 1);
        assert_eq!(stuck.ends.get(), 0);
    }

    #[test]
    fn test_unpiping_last_sink_hands_over_to_data_listeners() {
        let queue = TaskQueue::new();
        let source = Transform::new(PassThrough, TransformOptions::default(), queue.clone());
        let sink = source.pipe(RecordingSink::new(), PipeOptions::default());

        let heard = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&heard);
        source.on(EventKind::Data, move |event| {
            if let Event::Data(chunk) = event {
                log.borrow_mut().extend_from_slice(chunk);
            }
        });
        assert!(!source.is_push_mode());

        source.write(b"a".to_vec());
        queue.run_until_idle();
        source.unpipe_all();
        assert!(source.is_push_mode());

        source.write(b"b".to_vec());
        queue.run_until_idle();
        assert_eq!(sink.bytes(), b"a".to_vec());
        assert_eq!(heard.borrow().as_slice(), b"ab");
    }

    fn listen_for_data(stream: &Readable<Vec<u8>>) -> Rc<RefCell<Vec<u8>>> {
        let heard = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&heard);
        stream.on(EventKind::Data, move |event| {
            if let Event::Data(chunk) = event {
                log.borrow_mut().extend_from_slice(chunk);
            }
        });
        heard
    }

    #[test]
    fn test_sink_piped_in_push_mode_receives_data_and_end() {
        let queue = TaskQueue::new();
        let source = Transform::new(PassThrough, TransformOptions::default(), queue.clone());
        let heard = listen_for_data(&source);
        assert!(source.is_push_mode());

        let sink = source.pipe(RecordingSink::new(), PipeOptions::default());
        source.write(b"a".to_vec());
        source.write(b"b".to_vec());
        source.end();
        queue.run_until_idle();

        assert_eq!(sink.bytes(), b"ab".to_vec());
        assert_eq!(sink.ends.get(), 1);
        assert_eq!(heard.borrow().as_slice(), b"ab");
    }

    #[test]
    fn test_push_mode_waits_for_blocked_sink() {
        let queue = TaskQueue::new();
        let source = Transform::new(PassThrough, TransformOptions::default(), queue.clone());
        let heard = listen_for_data(&source);
        let sink = source.pipe(RecordingSink::blocking_at(1), PipeOptions::default());

        source.write(b"a".to_vec());
        queue.run_until_idle();
        source.write(b"b".to_vec());
        queue.run_until_idle();
        assert_eq!(sink.bytes(), b"a".to_vec());
        assert_eq!(heard.borrow().as_slice(), b"a");
        assert_eq!(source.awaiting_release(), 1);

        sink.release();
        queue.run_until_idle();
        assert_eq!(sink.bytes(), b"ab".to_vec());
        assert_eq!(heard.borrow().as_slice(), b"ab");
        assert_eq!(source.awaiting_release(), 0);
    }

    #[test]
    fn test_producer_error_reaches_listeners_and_stops_the_pipe() {
        let queue = TaskQueue::new();
        let served = Cell::new(false);
        let stream = Readable::new(
            source_fn(move |_size, done: PullCallback<Vec<u8>>| {
                if served.replace(true) {
                    done(Err(StreamError::producer("connection reset")));
                } else {
                    done(Ok(Pulled::Chunk(b"partial".to_vec())));
                }
            }),
            one_chunk_per_read(),
            queue.clone(),
        );
        let errors = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&errors);
        stream.on(EventKind::Error, move |event| {
            if let Event::Error(error) = event {
                seen.borrow_mut().push(error.to_string());
            }
        });
        let sink = stream.pipe(RecordingSink::new(), PipeOptions::default());

        queue.run_until_idle();

        assert_eq!(sink.bytes(), b"partial".to_vec());
        assert_eq!(*errors.borrow(), vec!["producer failed: connection reset".to_string()]);
        assert_eq!(sink.ends.get(), 0);
        assert!(stream.is_errored());
    }

    #[test]
    fn test_chained_stages_with_writable_backpressure() {
        let queue = TaskQueue::new();
        let written = Rc::new(RefCell::new(Vec::new()));
        let source = Readable::new(
            IterSource::new((0..20u8).map(|i| vec![b'a' + i; 8])),
            StreamOptions::default().with_low_water_mark(8),
            queue.clone(),
        );
        let upper = Transform::new(
            transform_fn(|chunk: Vec<u8>, output: TransformOutput<Vec<u8>>, done: StepCallback| {
                output.push(chunk.to_ascii_uppercase());
                done(Ok(()));
            }),
            TransformOptions::default(),
            queue.clone(),
        );
        let target = Rc::new(Writable::new(
            Collect(Rc::clone(&written)),
            WritableOptions::default()
                .with_high_water_mark(16)
                .with_low_water_mark(4),
            queue.clone(),
        ));
        let finished = Rc::new(Cell::new(false));
        let flag = Rc::clone(&finished);
        target.events().on(EventKind::Finish, move |_| flag.set(true));

        source
            .pipe(Rc::clone(&upper), PipeOptions::default())
            .pipe(Rc::clone(&target), PipeOptions::default());
        queue.run_until_idle();

        let expected: Vec<u8> = (0..20u8).flat_map(|i| vec![b'A' + i; 8]).collect();
        assert_eq!(*written.borrow(), expected);
        assert!(finished.get());
        assert!(upper.is_ended());
    }

    #[tokio::test]
    async fn test_pipeline_on_tokio_local_set() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler: Rc<dyn Scheduler> = TokioScheduler::new();
                let written = Rc::new(RefCell::new(Vec::new()));
                let (tx, rx) = tokio::sync::oneshot::channel();
                let tx = RefCell::new(Some(tx));

                let source = Readable::new(
                    IterSource::new(vec![b"hello ".to_vec(), b"tokio".to_vec()]),
                    StreamOptions::default(),
                    Rc::clone(&scheduler),
                );
                let target = Rc::new(Writable::new(
                    Collect(Rc::clone(&written)),
                    WritableOptions::default(),
                    Rc::clone(&scheduler),
                ));
                target.events().on(EventKind::Finish, move |_| {
                    if let Some(tx) = tx.borrow_mut().take() {
                        let _ = tx.send(());
                    }
                });

                source
                    .pipe(Transform::new(PassThrough, TransformOptions::default(), scheduler), PipeOptions::default())
                    .pipe(target, PipeOptions::default());

                rx.await.unwrap();
                assert_eq!(written.borrow().as_slice(), b"hello tokio");
            })
            .await;
    }
}
