use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use stepsim::game::chart::Lane;
use stepsim::game::events::{EventKind, GameEvent, MissCause};
use stepsim::game::gameplay::{self, GameConfig, State};
use stepsim::game::judgment::Judgment;
use stepsim::game::parsing::simfile;

const FRAME_MS: f32 = 1000.0 / 60.0;

fn ssc(grid: &str) -> String {
    format!(
        "#TITLE:Fixture;\n#ARTIST:Nobody;\n#MUSIC:fixture.ogg;\n#OFFSET:0;\n#BPMS:0.000=120.000;\n\
         #NOTEDATA:;\n#DIFFICULTY:Easy;\n#METER:2;\n#NOTES:\n{grid}\n;\n"
    )
}

fn load(grid: &str) -> State {
    let chart = simfile::parse(&ssc(grid), Path::new("songs/fixture")).expect("fixture parses");
    let mut state = gameplay::init(GameConfig::default());
    gameplay::load_chart(&mut state, &chart, 0).expect("level 0 exists");
    state
}

#[test]
fn single_step_on_time_then_ghost_tap() {
    let mut state = load("0100\n0000\n0000\n0000");
    gameplay::start(&mut state);

    let hits = Rc::new(RefCell::new(Vec::new()));
    let h = Rc::clone(&hits);
    state.events.on(EventKind::Hit, move |e| {
        if let GameEvent::Hit { judgment, .. } = e {
            h.borrow_mut().push(*judgment);
        }
    });
    let misses = Rc::new(RefCell::new(Vec::new()));
    let m = Rc::clone(&misses);
    state.events.on(EventKind::Miss, move |e| {
        if let GameEvent::Miss { cause, .. } = e {
            m.borrow_mut().push(*cause);
        }
    });

    gameplay::handle_input(&mut state, Lane::Down);
    assert_eq!(*hits.borrow(), vec![Judgment::Marvelous]);
    assert_eq!(state.scoring.combo, 1);

    gameplay::handle_input(&mut state, Lane::Down);
    assert_eq!(*misses.borrow(), vec![MissCause::Ghost]);
    assert_eq!(state.scoring.combo, 0);
    assert_eq!(state.scoring.max_combo, 1);
}

#[test]
fn unheld_hold_is_dropped_early_and_never_completes() {
    let mut state = load("2000\n3000\n0000\n0000");
    assert_eq!(state.tails.len(), 1);
    assert_eq!(state.tails[0].duration, 1.0);
    gameplay::start(&mut state);
    gameplay::handle_input(&mut state, Lane::Left);

    let released = [false; 4];
    let mut clock = 0.0f64;
    let mut dropped_at = None;
    while state.current_beat < 4.0 && !gameplay::is_finished(&state) {
        clock += f64::from(FRAME_MS);
        gameplay::update(&mut state, FRAME_MS, clock, &released);
        if dropped_at.is_none() && state.tail_meta[0].dropped {
            dropped_at = Some(state.current_beat);
        }
        assert!(!state.tail_meta[0].is_completed(), "dropped hold completed at beat {}", state.current_beat);
    }

    let beat = dropped_at.expect("hold should drop");
    assert!(beat > 0.1 && beat < 0.2, "dropped at beat {beat}");
    assert_eq!(state.scoring.score, 5.0, "no penalty by default");
}

#[test]
fn reset_then_reload_reproduces_a_fresh_load() {
    let chart = simfile::parse(&ssc("2000\n0100\n3010\n0000\n,\n4000\n0000\n3000\n0000"), Path::new("")).unwrap();
    let mut fresh = gameplay::init(GameConfig::default());
    gameplay::load_chart(&mut fresh, &chart, 0).unwrap();

    let mut state = gameplay::init(GameConfig::default());
    gameplay::load_chart(&mut state, &chart, 0).unwrap();
    gameplay::start(&mut state);
    gameplay::handle_input(&mut state, Lane::Left);
    let mut clock = 0.0;
    for _ in 0..120 {
        clock += f64::from(FRAME_MS);
        gameplay::update(&mut state, FRAME_MS, clock, &|lane: Lane| lane == Lane::Left);
    }
    assert!(state.note_states.iter().any(|n| n.missed));

    gameplay::reset(&mut state);
    gameplay::load_chart(&mut state, &chart, 0).unwrap();
    assert_eq!(state.note_states, fresh.note_states);
    assert_eq!(state.tail_meta, fresh.tail_meta);
    assert_eq!(state.tail_head_indices, fresh.tail_head_indices);
    assert_eq!(state.scoring.snapshot(), fresh.scoring.snapshot());
}

#[test]
fn unterminated_tail_is_a_warning_not_a_failure() {
    let chart = simfile::parse(&ssc("0020\n0000\n0000\n0000"), Path::new("")).unwrap();
    let mut state = gameplay::init(GameConfig::default());
    let warnings = Rc::new(RefCell::new(0));
    let w = Rc::clone(&warnings);
    state.events.on(EventKind::Warning, move |_| *w.borrow_mut() += 1);
    gameplay::load_chart(&mut state, &chart, 0).unwrap();
    assert_eq!(*warnings.borrow(), 1);
    assert!(state.tails[0].is_unterminated());
    assert_eq!(state.tail_head_indices, vec![Some(1)]);
}

#[test]
fn parsed_timelines_are_monotonic() {
    let text = "#TITLE:x;#MUSIC:x.ogg;#OFFSET:0.05;#BPMS:0=100,3=200,1=150;#STOPS:2=1;\
                #NOTEDATA:;#METER:3;#NOTES:\n1000\n0100\n0010\n0001\n,\n1111\n;\
                #NOTEDATA:;#METER:1;#NOTES:\n1000\n;";
    let chart = simfile::parse(text, Path::new("")).unwrap();
    assert_eq!(chart.levels.len(), 2);
    assert_eq!(chart.levels[0].meter, 1);
    for level in &chart.levels {
        let timeline = level.timeline();
        assert!(timeline.windows(2).all(|w| w[0].beat <= w[1].beat));
    }
}
