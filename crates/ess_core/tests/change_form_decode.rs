mod common;

use common::{SaveBuilder, change_form, compressed_change_form};
use ess_core::changeform::{Body, ChangeFormType, DecodeState};
use ess_core::header::Game;
use ess_core::{DecodeMode, Ess, EssError, ReadOptions};

const REFR: u8 = 0;
const NPC: u8 = 9;
const MISC: u8 = 18;
const FLST: u8 = 43;
const LVLN: u8 = 44;

const ADDED: u32 = 1 << 31;

fn read(builder: SaveBuilder) -> (Ess, Vec<u8>) {
    let bytes = builder.build();
    let ess = Ess::read_bytes(&bytes, ReadOptions::default()).expect("failed to parse synthetic save");
    (ess, bytes)
}

fn form_list_body(extra: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&2i32.to_le_bytes());
    body.extend_from_slice(&[0x40, 0x00, 0x20]);
    body.extend_from_slice(&[0x00, 0x00, 0x01]);
    body.extend_from_slice(extra);
    body
}

fn with_form(raw: u32, flags: u32, type_code: u8, body: &[u8]) -> SaveBuilder {
    SaveBuilder::new(Game::SkyrimLe).change_form(change_form(raw, flags, type_code, body))
}

#[test]
fn change_form_types_follow_the_game_table() {
    let (ess, _) = read(with_form(0x40_0100, 0, FLST, &[]));
    let form = ess.change_forms().iter().next().expect("one form");
    assert_eq!(form.kind(), Some(ChangeFormType::Flst));
    assert_eq!(form.type_name(), "FLST");
    assert_eq!(ChangeFormType::Flst.code(Game::Fallout4), Some(48));
    assert_eq!(ChangeFormType::from_code(Game::Fallout4, 13), Some(ChangeFormType::Npc));
    assert_eq!(ChangeFormType::from_code(Game::SkyrimSe, 63), None);
}

#[test]
fn form_list_decodes_and_resolves_indexed_refids() {
    let (mut ess, bytes) = read(with_form(0x40_0100, ADDED, FLST, &form_list_body(&[])));
    let refid = ess.make_ref_id(0x40_0100);

    let body = ess
        .decode_change_form(&refid, DecodeMode::BestEffort)
        .expect("decode")
        .expect("form exists");
    let Body::FormList(list) = body else {
        panic!("expected a form list, got {}", body.name());
    };
    let forms = list.forms();
    assert_eq!(forms.len(), 2);
    assert_eq!(forms[0].form_id(), Some(0x20));
    assert_eq!(forms[1].form_id(), Some(0x0000_0014));
    assert_eq!(list.record().get_i32("count"), Some(2));

    let form = ess.change_form(&refid).expect("form");
    assert!(form.is_decoded());
    assert!(matches!(form.state(), DecodeState::Typed(_)));
    assert_eq!(ess.to_bytes().expect("serialize"), bytes);
}

#[test]
fn leveled_list_entries() {
    let mut body = vec![1];
    body.push(5);
    body.extend_from_slice(&[0x40, 0x00, 0x77]);
    body.extend_from_slice(&3i16.to_le_bytes());
    body.push(25);
    let (mut ess, _) = read(with_form(0x40_0100, ADDED, LVLN, &body));
    let refid = ess.make_ref_id(0x40_0100);

    let Some(Body::LeveledList(list)) = ess.decode_change_form(&refid, DecodeMode::Strict).expect("decode") else {
        panic!("expected a leveled list");
    };
    let entries = list.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].level, 5);
    assert_eq!(entries[0].refid.form_id(), Some(0x77));
    assert_eq!(entries[0].count, 3);
    assert_eq!(entries[0].chance, 25);
}

#[test]
fn compressed_actor_body_is_inflated_before_decoding() {
    let mut body = Vec::new();
    body.extend_from_slice(&5u16.to_le_bytes());
    body.extend_from_slice(b"Lydia");
    let builder = SaveBuilder::new(Game::SkyrimLe).change_form(compressed_change_form(0x40_0100, 1 << 5, NPC, &body));
    let (mut ess, bytes) = read(builder);
    let refid = ess.make_ref_id(0x40_0100);
    assert!(ess.change_form(&refid).expect("form").is_compressed());

    let Some(Body::ActorBase(npc)) = ess.decode_change_form(&refid, DecodeMode::Strict).expect("decode") else {
        panic!("expected an actor base");
    };
    assert_eq!(npc.full_name().map(|n| n.to_string()).as_deref(), Some("Lydia"));
    assert_eq!(ess.to_bytes().expect("serialize"), bytes);
}

#[test]
fn leftover_bytes_become_unparsed_chunks_in_best_effort_mode() {
    let (mut ess, bytes) = read(with_form(0x40_0100, ADDED, FLST, &form_list_body(&[9, 9, 9])));
    let refid = ess.make_ref_id(0x40_0100);

    let body = ess
        .decode_change_form(&refid, DecodeMode::BestEffort)
        .expect("decode")
        .expect("form exists");
    assert!(!body.is_fallback());
    let record = body.record().expect("typed body has a record");
    assert_eq!(record.get_bytes("unparsed_0"), Some(&[9, 9, 9][..]));
    assert_eq!(ess.to_bytes().expect("serialize"), bytes);
}

#[test]
fn leftover_bytes_fail_strict_decoding() {
    let (mut ess, _) = read(with_form(0x40_0100, ADDED, FLST, &form_list_body(&[9])));
    let refid = ess.make_ref_id(0x40_0100);

    let err = ess.decode_change_form(&refid, DecodeMode::Strict).unwrap_err();
    assert!(matches!(&err, EssError::Decode { reason, .. } if reason.contains("1 bytes left")), "{err}");
    assert!(!err.is_fatal());
    assert!(!ess.change_form(&refid).expect("form").is_decoded());
}

#[test]
fn broken_body_falls_back_to_opaque_bytes() {
    let body = [0x40, 0x00, 0x3C, 0, 0, 0];
    let (mut ess, bytes) = read(with_form(0x40_0100, 1 << 1, REFR, &body));

    let stats = ess.decode_all(DecodeMode::BestEffort);
    assert_eq!(stats.fallback, 1);
    assert_eq!(stats.typed, 0);
    assert!(stats.failed.is_empty());

    let refid = ess.make_ref_id(0x40_0100);
    let form = ess.change_form(&refid).expect("form");
    let DecodeState::Fallback(Body::Default(opaque)) = form.state() else {
        panic!("expected a fallback body");
    };
    assert_eq!(opaque.data, body);
    assert!(opaque.reason.is_some());

    let err = ess.decode_change_form(&refid, DecodeMode::Strict).unwrap_err();
    assert!(matches!(err, EssError::Decode { .. }));
    assert_eq!(ess.to_bytes().expect("serialize"), bytes);
}

#[test]
fn strict_decode_all_collects_failures() {
    let builder = with_form(0x40_0100, 1 << 1, REFR, &[0x40, 0x00, 0x3C])
        .change_form(change_form(0x40_0200, ADDED, FLST, &form_list_body(&[])))
        .change_form(change_form(0x40_0300, 0, MISC, &[1, 2]));
    let (mut ess, _) = read(builder);

    let stats = ess.decode_all(DecodeMode::Strict);
    assert_eq!(stats.typed, 1);
    assert_eq!(stats.opaque, 1);
    assert_eq!(stats.fallback, 0);
    assert_eq!(stats.failed.len(), 1);
    assert_eq!(stats.failed[0].0, "00000100");
}

#[test]
fn types_without_a_decoder_stay_opaque() {
    let (mut ess, _) = read(with_form(0x40_0100, 0, MISC, &[1, 2, 3]));
    let refid = ess.make_ref_id(0x40_0100);
    let Some(Body::Default(opaque)) = ess.decode_change_form(&refid, DecodeMode::Strict).expect("decode") else {
        panic!("expected an opaque body");
    };
    assert_eq!(opaque.data, vec![1, 2, 3]);
    assert!(opaque.reason.is_none());
}

#[test]
fn missing_refid_decodes_to_none() {
    let (mut ess, _) = read(with_form(0x40_0100, 0, MISC, &[]));
    let refid = ess.make_ref_id(0x40_0999);
    assert!(ess.decode_change_form(&refid, DecodeMode::Strict).expect("decode").is_none());
}

#[test]
fn read_time_decoding_is_off_until_asked() {
    let (ess, _) = read(with_form(0x40_0100, ADDED, FLST, &form_list_body(&[])));
    assert!(ess.change_forms().iter().all(|f| !f.is_decoded()));
}
