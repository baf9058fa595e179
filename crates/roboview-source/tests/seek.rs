//! Seeking reconstructs the same state as reading forward.

use proptest::prelude::*;
use roboview_protocol::Framing;
use roboview_scene::{GameState, SceneGraph};
use roboview_source::LogCursor;
use roboview_test_utils::{moving_team, temp_log};

/// State after reading forward from the start until the next frame is
/// stamped after `time`.
fn replay_forward(cursor: &mut LogCursor, time: f64) -> (SceneGraph, GameState) {
    let start = cursor.rewind().unwrap();
    let mut graph = SceneGraph::new();
    let mut game = GameState::default();
    graph.apply_frame(&start);
    game.apply_frame(&start);
    while let Some(t) = cursor.time_of(cursor.position()).unwrap() {
        if t > time {
            break;
        }
        let frame = cursor.next_frame().unwrap().unwrap();
        graph.apply_frame(&frame);
        game.apply_frame(&frame);
    }
    (graph, game)
}

fn state_of(frame: &roboview_core::Frame) -> (SceneGraph, GameState) {
    let mut graph = SceneGraph::new();
    let mut game = GameState::default();
    graph.apply_frame(frame);
    game.apply_frame(frame);
    (graph, game)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn seek_matches_forward_replay(
        n in 5usize..80,
        full_every in 0usize..15,
        interval in proptest::option::of(1usize..10),
        lines in any::<bool>(),
        at in 0.0f64..1.0,
    ) {
        let framing = if lines { Framing::Lines } else { Framing::LengthPrefixed };
        let frames = moving_team(n, 3, full_every);
        let log = temp_log(&frames, framing).unwrap();
        let target = at * frames[n - 1].time;

        let mut cursor = LogCursor::open(log.path(), interval).unwrap();
        let sought = cursor.seek_time(target).unwrap();
        prop_assert!(sought.is_full());
        let (graph, game) = state_of(&sought);

        let (fwd_graph, fwd_game) = replay_forward(&mut cursor, target);
        prop_assert!(graph.same_content(&fwd_graph));
        prop_assert_eq!(game, fwd_game);
    }

    #[test]
    fn repeated_seeks_agree(
        n in 10usize..60,
        interval in proptest::option::of(1usize..8),
        picks in proptest::collection::vec(0usize..60, 1..8),
    ) {
        let frames = moving_team(n, 2, 0);
        let log = temp_log(&frames, Framing::LengthPrefixed).unwrap();
        let mut cold = LogCursor::open(log.path(), interval).unwrap();
        let mut warm = LogCursor::open(log.path(), interval).unwrap();
        // Warm up checkpoints by reading the whole log once.
        while warm.next_frame().unwrap().is_some() {}

        for k in picks {
            let k = k.min(n);
            let a = state_of(&cold.seek_frame(k).unwrap());
            let b = state_of(&warm.seek_frame(k).unwrap());
            prop_assert!(a.0.same_content(&b.0));
            prop_assert_eq!(&a.1, &b.1);
            prop_assert_eq!(cold.position(), k);
        }
    }
}

#[test]
fn seek_then_rewind_then_forward_equals_direct_seek() {
    let frames = moving_team(120, 4, 30);
    let log = temp_log(&frames, Framing::Lines).unwrap();
    let mut cursor = LogCursor::open(log.path(), Some(16)).unwrap();

    let t = frames[77].time;
    let direct = state_of(&cursor.seek_time(t).unwrap());
    cursor.seek_time(0.0).unwrap();
    let (graph, game) = replay_forward(&mut cursor, t);
    assert!(direct.0.same_content(&graph));
    assert_eq!(direct.1, game);
    assert!(cursor.checkpoints() > 0);
}
