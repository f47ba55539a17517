mod common;

use common::{SaveBuilder, change_form, compressed_change_form, global_variables};
use ess_core::compression::CompressionType;
use ess_core::header::Game;
use ess_core::{Ess, EssError, ReadOptions, verify_identical};

const FLST: u8 = 43;
const MISC: u8 = 18;

fn read(bytes: &[u8]) -> Ess {
    Ess::read_bytes(bytes, ReadOptions::default()).expect("failed to parse synthetic save")
}

fn populated(game: Game) -> SaveBuilder {
    let mut form_list = Vec::new();
    form_list.extend_from_slice(&2i32.to_le_bytes());
    form_list.extend_from_slice(&[0x40, 0x00, 0x20, 0x00, 0x00, 0x01]);
    SaveBuilder::new(game)
        .change_form(change_form(0x40_0100, 1 << 31, FLST, &form_list))
        .change_form(change_form(0x40_0200, 0, MISC, &[1, 2, 3, 4, 5]))
        .change_form(compressed_change_form(0x40_0300, 0, MISC, &[0x11; 120]))
}

#[test]
fn skyrim_le_roundtrip_is_byte_identical() {
    let bytes = populated(Game::SkyrimLe).build();
    let ess = read(&bytes);

    assert_eq!(ess.game(), Game::SkyrimLe);
    assert_eq!(ess.form_version(), 74);
    assert_eq!(ess.plugins().full().len(), 2);
    assert!(ess.plugins().lite().is_none());
    assert_eq!(ess.table1().len(), 2);
    assert_eq!(ess.table2().len(), 1);
    assert_eq!(ess.change_forms().len(), 3);
    assert_eq!(ess.table3().len(), 1);
    assert_eq!(ess.form_ids(), &[0x0000_0014, 0x0100_0D62]);
    assert_eq!(ess.worldspaces(), &[0x3C]);
    assert!(!ess.is_truncated());
    assert_eq!(ess.digest(), crc32fast::hash(&bytes));

    assert_eq!(ess.to_bytes().expect("serialize"), bytes);
}

#[test]
fn empty_change_form_region_roundtrips() {
    let bytes = SaveBuilder::new(Game::SkyrimLe).build();
    let ess = read(&bytes);

    assert_eq!(ess.plugins().full().len(), 2);
    assert!(ess.change_forms().is_empty());
    assert_eq!(ess.offsets().change_form_count, 0);
    assert_eq!(ess.size(), bytes.len());
    assert_eq!(ess.to_bytes().expect("serialize"), bytes);
}

#[test]
fn skyrim_se_uncompressed_roundtrip_keeps_lite_plugin_block() {
    let mut builder = populated(Game::SkyrimSe);
    builder.lite_plugins = Some(vec!["ccBGSSSE001-Fish.esl".to_string()]);
    let bytes = builder.build();
    let ess = read(&bytes);

    let lite = ess.plugins().lite().expect("lite plugins");
    assert_eq!(lite.len(), 1);
    assert_eq!(lite[0].index_label(), "FE:000");
    assert_eq!(ess.compression(), CompressionType::None);
    assert_eq!(ess.body_lengths(), None);
    assert_eq!(ess.to_bytes().expect("serialize"), bytes);
}

#[test]
fn fallout4_roundtrip_with_version_string() {
    let mut builder = populated(Game::Fallout4);
    builder.plugins = vec!["Fallout4.esm".to_string()];
    builder.table3.push((1001, vec![5; 9]));
    let bytes = builder.build();
    let ess = read(&bytes);

    assert_eq!(ess.game(), Game::Fallout4);
    assert_eq!(
        ess.version_string().map(|v| v.to_string()).as_deref(),
        Some("1.10.163.0")
    );
    assert_eq!(ess.offsets().table3_count, 1);
    assert_eq!(ess.papyrus().map(|b| b.data.len()), Some(9));
    assert_eq!(ess.to_bytes().expect("serialize"), bytes);
}

#[test]
fn fallout4_lite_plugins_follow_header_version() {
    let mut builder = SaveBuilder::new(Game::Fallout4);
    builder.version = 15;
    builder.lite_plugins = Some(vec!["a.esl".to_string(), "b.esl".to_string()]);
    let bytes = builder.build();
    let ess = read(&bytes);
    assert_eq!(ess.plugins().lite().map(<[_]>::len), Some(2));
    assert_eq!(ess.to_bytes().expect("serialize"), bytes);
}

#[test]
fn skyrim_table3_count_is_stored_one_lower() {
    let builder = populated(Game::SkyrimLe).table3_block(1002, vec![7; 4]);
    let (bytes, at) = builder.build_uncompressed();
    let stored = u32::from_le_bytes(bytes[at.offset_table + 32..at.offset_table + 36].try_into().unwrap());
    assert_eq!(stored, 1);

    let ess = read(&bytes);
    assert_eq!(ess.offsets().table3_count, 2);
    assert_eq!(ess.table3().len(), 2);
    assert!(ess.anim_objects().is_some());
    assert_eq!(ess.to_bytes().expect("serialize"), bytes);
}

#[test]
fn zlib_body_roundtrip() {
    let builder = populated(Game::SkyrimSe).compression(CompressionType::Zlib);
    let bytes = builder.build();
    let (plain, at) = builder.build_uncompressed();
    let ess = read(&bytes);

    assert_eq!(ess.compression(), CompressionType::Zlib);
    let lengths = ess.body_lengths().expect("compressed saves carry body lengths");
    assert_eq!(lengths.uncompressed as usize, plain.len() - at.header_size);
    assert_eq!(lengths.compressed as usize, bytes.len() - at.header_size - 8);
    assert_eq!(ess.size(), plain.len());

    let written = ess.to_bytes().expect("serialize");
    assert_eq!(written, bytes);
    verify_identical(&ess, &read(&written)).expect("structurally identical");
}

#[test]
fn lz4_body_roundtrip() {
    let bytes = populated(Game::SkyrimSe).compression(CompressionType::Lz4).build();
    let ess = read(&bytes);
    assert_eq!(ess.compression(), CompressionType::Lz4);

    let reread = read(&ess.to_bytes().expect("serialize"));
    verify_identical(&ess, &reread).expect("structurally identical");
    assert_eq!(reread.change_forms().len(), 3);
}

#[test]
fn recompressing_changes_only_the_envelope() {
    let plain = populated(Game::SkyrimSe).build();
    let mut ess = read(&plain);
    ess.set_compression(CompressionType::Lz4).expect("SE supports lz4");
    let packed = ess.to_bytes().expect("serialize");
    assert_ne!(packed, plain);

    let mut back = read(&packed);
    assert_eq!(back.compression(), CompressionType::Lz4);
    assert_eq!(back.change_forms().len(), ess.change_forms().len());
    back.set_compression(CompressionType::None).expect("none is always allowed");
    assert_eq!(back.to_bytes().expect("serialize"), plain);
}

#[test]
fn compression_is_refused_without_a_header_field() {
    for game in [Game::SkyrimLe, Game::Fallout4] {
        let mut ess = read(&SaveBuilder::new(game).build());
        let err = ess.set_compression(CompressionType::Zlib).unwrap_err();
        assert!(matches!(err, EssError::Format(_)), "{game}: {err}");
        ess.set_compression(CompressionType::None).expect("none is always allowed");
    }
}

#[test]
fn size_matches_serialized_length() {
    let bytes = populated(Game::SkyrimLe).tail(vec![0xDE, 0xAD, 0xBE, 0xEF]).build();
    let ess = read(&bytes);
    assert_eq!(ess.unknown_tail(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(ess.size(), bytes.len());
    assert_eq!(ess.original_size(), bytes.len());
    ess.layout().check_covers(bytes.len()).expect("regions cover the file");
    assert_eq!(ess.to_bytes().expect("serialize").len(), ess.size());
}

#[test]
fn global_variables_are_decoded_from_table1() {
    let builder = SaveBuilder::new(Game::SkyrimLe);
    let ess = read(&builder.build());
    let vars = &ess.global_variables().variables;
    assert_eq!(vars.len(), 1);
    assert_eq!(vars[0].refid.form_id(), Some(0x10));
    assert_eq!(vars[0].value, 1.5);
}

#[test]
fn malformed_global_variables_keep_raw_block() {
    let mut builder = SaveBuilder::new(Game::SkyrimLe);
    let mut broken = global_variables(&[(0x40_0010, 1.0)]);
    broken.push(0xFF);
    builder.table1[1].1 = broken;
    let bytes = builder.build();
    let ess = read(&bytes);
    assert!(ess.global_variables().is_empty());
    assert_eq!(ess.to_bytes().expect("serialize"), bytes);
}

#[test]
fn duplicate_refids_keep_the_later_form() {
    let bytes = SaveBuilder::new(Game::SkyrimLe)
        .change_form(change_form(0x40_0100, 0, MISC, &[1, 1]))
        .change_form(change_form(0x40_0200, 0, MISC, &[2]))
        .change_form(change_form(0x40_0100, 0, MISC, &[3, 3, 3]))
        .build();
    let mut ess = read(&bytes);

    assert_eq!(ess.change_forms().len(), 2);
    let first = ess.change_forms().iter().next().expect("first form");
    assert_eq!(first.raw_body(), &[3, 3, 3]);
    let refid = ess.make_ref_id(0x40_0100);
    assert_eq!(ess.change_form(&refid).map(|f| f.raw_body().len()), Some(3));

    let reread = read(&ess.to_bytes().expect("serialize"));
    verify_identical(&ess, &reread).expect("structurally identical");
}

#[test]
fn verify_reports_the_differing_change_form() {
    let a = read(&populated(Game::SkyrimLe).build());
    let mut builder = populated(Game::SkyrimLe);
    builder.change_forms[1] = change_form(0x40_0200, 0, MISC, &[1, 2, 3, 4, 6]);
    let b = read(&builder.build());

    let err = verify_identical(&a, &b).unwrap_err();
    assert!(matches!(&err, EssError::Verify(msg) if msg.contains("00000200")), "{err}");
}

#[test]
fn verify_reports_papyrus_differences() {
    let a = read(&SaveBuilder::new(Game::SkyrimLe).build());
    let mut builder = SaveBuilder::new(Game::SkyrimLe);
    builder.table3[0].1 = vec![0xAA, 0xBB, 0xCD];
    let b = read(&builder.build());

    let err = verify_identical(&a, &b).unwrap_err();
    assert!(matches!(&err, EssError::Verify(msg) if msg.contains("papyrus")), "{err}");
}
