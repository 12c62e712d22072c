use crate::game::chart::Lane;
use crate::game::judgment::Judgment;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissCause {
    /// The note scrolled past the miss window unhit.
    Timeout,
    /// A press that matched nothing.
    Ghost,
}

/// Non-fatal chart inconsistencies found while loading a level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum EngineWarning {
    UnterminatedTail { tail: usize, lane: Lane, beat: f32 },
    UnmatchedTailHead { tail: usize, lane: Lane, beat: f32 },
}

/// Per-tail runtime flags. `available` drops to false once the tail
/// completes; `dropped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TailMeta {
    pub active: bool,
    pub available: bool,
    pub holding: bool,
    pub dropped: bool,
}

impl Default for TailMeta {
    fn default() -> Self {
        Self { active: true, available: true, holding: false, dropped: false }
    }
}

impl TailMeta {
    #[inline(always)]
    pub const fn is_completed(&self) -> bool {
        !self.available && !self.dropped
    }

    /// Completed or dropped; nothing further can happen to this tail.
    #[inline(always)]
    pub const fn is_settled(&self) -> bool {
        self.dropped || !self.available
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// `offset_ms` is `None` for roll taps, which reuse the head's grade.
    Hit { lane: Lane, note_index: usize, judgment: Judgment, offset_ms: Option<f32> },
    Miss { lane: Option<Lane>, note_index: Option<usize>, cause: MissCause },
    ComboChange { combo: u32, max_combo: u32 },
    ScoreChange { score: f64 },
    BeatUpdate { beat: f32 },
    TailUpdate { index: usize, meta: TailMeta },
    BpmChange { bpm: f32 },
    Pause { active: bool },
    Finished,
    Warning(EngineWarning),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Hit,
    Miss,
    ComboChange,
    ScoreChange,
    BeatUpdate,
    TailUpdate,
    BpmChange,
    Pause,
    Finished,
    Warning,
}

impl EventKind {
    pub const COUNT: usize = 10;

    #[inline(always)]
    const fn slot(self) -> usize {
        self as usize
    }
}

impl GameEvent {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Hit { .. } => EventKind::Hit,
            Self::Miss { .. } => EventKind::Miss,
            Self::ComboChange { .. } => EventKind::ComboChange,
            Self::ScoreChange { .. } => EventKind::ScoreChange,
            Self::BeatUpdate { .. } => EventKind::BeatUpdate,
            Self::TailUpdate { .. } => EventKind::TailUpdate,
            Self::BpmChange { .. } => EventKind::BpmChange,
            Self::Pause { .. } => EventKind::Pause,
            Self::Finished => EventKind::Finished,
            Self::Warning(_) => EventKind::Warning,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Rc<dyn Fn(&GameEvent)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    by_kind: [Vec<(ListenerId, Handler)>; EventKind::COUNT],
}

/// Synchronous publish/subscribe for engine signals.
///
/// Cloning yields another handle onto the same listener table, which is how
/// a handler can register or remove listeners while being dispatched.
/// Changes made during a dispatch apply from the next `emit`.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<Listeners>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<usize> = self.inner.borrow().by_kind.iter().map(Vec::len).collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&GameEvent) + 'static,
    {
        let handler: Handler = Rc::new(handler);
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.by_kind[kind.slot()].push((id, handler));
        id
    }

    /// Registers `handler` for every event kind. Returns one id per kind.
    pub fn on_all<F>(&self, handler: F) -> Vec<ListenerId>
    where
        F: Fn(&GameEvent) + 'static,
    {
        let handler: Handler = Rc::new(handler);
        let mut inner = self.inner.borrow_mut();
        let mut ids = Vec::with_capacity(EventKind::COUNT);
        for slot in 0..EventKind::COUNT {
            let id = ListenerId(inner.next_id);
            inner.next_id += 1;
            inner.by_kind[slot].push((id, Rc::clone(&handler)));
            ids.push(id);
        }
        ids
    }

    pub fn off(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        for list in &mut inner.by_kind {
            if let Some(pos) = list.iter().position(|(lid, _)| *lid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.borrow().by_kind[kind.slot()].len()
    }

    pub fn emit(&self, event: &GameEvent) {
        let snapshot: Vec<Handler> = {
            let inner = self.inner.borrow();
            let list = &inner.by_kind[event.kind().slot()];
            if list.is_empty() {
                return;
            }
            list.iter().map(|(_, h)| Rc::clone(h)).collect()
        };
        for handler in snapshot {
            handler(event);
        }
    }
}
