// Laws that hold for every document reachable through editing

use std::time::Instant;

use proptest::prelude::*;
use vente_editor::config::EditorConfig;
use vente_editor::richtext::html_converter::{document_to_html, parse_document};
use vente_editor::richtext::insert_menu::{BlockInsertMenu, InsertKind};
use vente_editor::richtext::invariants;
use vente_editor::richtext::keyboard::{Key, KeyEvent};
use vente_editor::richtext::selection::{EditorEvent, HostCaret};
use vente_editor::richtext::session::{EditorHost, EditorSession};
use vente_editor::richtext::toolbar::{FloatingToolbar, FormatCommand};

struct NullHost;

impl EditorHost for NullHost {
    fn on_change(&mut self, _content: &str) {}
}

#[derive(Debug, Clone)]
enum Action {
    Key(KeyEvent),
    Click(usize, usize),
    Select((usize, usize), (usize, usize)),
    Format(FormatCommand),
    Insert(InsertKind),
    PickImage(Option<String>),
}

fn arb_initial() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "",
        "<p>hello world</p>",
        "<h2>Title</h2><p><br></p>",
        "<blockquote>quoted</blockquote><ul><li>one</li><li>two</li></ul>",
        "<p>a</p><hr><p>b <strong>bold</strong> <em>it</em></p><img src=\"x.png\">",
        "<ol><li>first</li></ol><p><br></p><p>tail</p>",
    ])
}

fn arb_key() -> impl Strategy<Value = KeyEvent> {
    let key = prop_oneof![
        prop::sample::select(vec!['a', 'b', ' ', 'é']).prop_map(Key::Char),
        Just(Key::Enter),
        Just(Key::Backspace),
        Just(Key::Delete),
        Just(Key::ArrowLeft),
        Just(Key::ArrowRight),
        Just(Key::ArrowUp),
        Just(Key::ArrowDown),
        Just(Key::Home),
        Just(Key::End),
    ];
    (key, any::<bool>()).prop_map(|(key, shift)| {
        let event = KeyEvent::new(key);
        if shift { event.with_shift() } else { event }
    })
}

fn arb_shortcut() -> impl Strategy<Value = KeyEvent> {
    prop::sample::select(vec!['a', 'b', 'i'])
        .prop_map(|ch| KeyEvent::new(Key::Char(ch)).with_ctrl())
}

fn arb_point() -> impl Strategy<Value = (usize, usize)> {
    (0usize..6, 0usize..14)
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        6 => arb_key().prop_map(Action::Key),
        1 => arb_shortcut().prop_map(Action::Key),
        2 => arb_point().prop_map(|(block, offset)| Action::Click(block, offset)),
        2 => (arb_point(), arb_point()).prop_map(|(a, b)| Action::Select(a, b)),
        2 => prop::sample::select(FloatingToolbar::COMMANDS.to_vec()).prop_map(Action::Format),
        2 => prop::sample::select(BlockInsertMenu::ITEMS.to_vec()).prop_map(Action::Insert),
        1 => prop::option::of(Just("pic.png".to_string())).prop_map(Action::PickImage),
    ]
}

fn perform(session: &mut EditorSession<NullHost>, action: Action) {
    let now = Instant::now();
    // Refused commands are part of the exploration
    match action {
        Action::Key(event) => {
            session.handle_key(event, now);
        }
        Action::Click(block, offset) => {
            session.set_caret(HostCaret::in_block(block, offset));
            session.notify(EditorEvent::Click, now);
        }
        Action::Select(anchor, focus) => {
            session.set_selection(
                HostCaret::in_block(anchor.0, anchor.1),
                HostCaret::in_block(focus.0, focus.1),
            );
            session.notify(EditorEvent::SelectionChange, now);
        }
        Action::Format(command) => {
            let _ = session.apply_format(command);
        }
        Action::Insert(kind) => {
            let _ = session.insert_block(kind);
        }
        Action::PickImage(source) => {
            let _ = session.complete_image_pick(source);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every edited document is non-empty, canonical and survives the HTML round trip
    #[test]
    fn prop_edits_preserve_document_laws(
        initial in arb_initial(),
        actions in prop::collection::vec(arb_action(), 1..40),
    ) {
        let mut session = EditorSession::new(initial, NullHost, EditorConfig::immediate());

        for action in actions {
            perform(&mut session, action.clone());

            let doc = session.document().clone();
            prop_assert!(doc.block_count() >= 1, "empty document after {:?}", action);

            let html = document_to_html(&doc);
            prop_assert_eq!(&html, session.content());
            prop_assert_eq!(parse_document(&html).ok(), Some(doc.clone()), "after {:?}", action);

            let mut enforced = doc.clone();
            prop_assert!(!invariants::enforce(&mut enforced), "not canonical after {:?}", action);
            prop_assert_eq!(enforced, doc);
        }
    }
}
