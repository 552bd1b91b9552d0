// SPDX-License-Identifier: MIT
//! End-to-end load / save / extract tests over complete preset files


use fxp_preset::writer::write_file;
use fxp_preset::{
    batch, Fidelity, FxpError, HumanReadableView, Parameter, PatchDocument, PatchReader,
    PatchWriter, ProgramName, RoundTripVerifier, SizeField, SizeMismatch, SizePolicy, SplitMode,
    SplitWarning, ToolConfig, WriteStrategy, FXP_HEADER_SIZE,
};
use test_fixtures::{lead_preset, wavetable, PresetBytes, PresetDir, LEAD_XML, ORDERED_XML};

#[test]
fn lead_preset_round_trips_and_extracts() {
    let bytes = lead_preset();
    let document = PatchDocument::load_raw(&bytes).unwrap();

    assert!(document.header().is_program_chunk());
    assert_eq!(document.header().prg_name.as_str(), "Lead1");
    assert_eq!(document.serialize().unwrap(), bytes);

    let view = HumanReadableView::from_document(&document).unwrap();
    assert_eq!(view.meta.unwrap().name.as_deref(), Some("Lead1"));
    assert_eq!(view.parameters.get("cutoff"), Some(&Parameter::new("f", "0.5")));
}

#[test]
fn trailing_wavetable_is_preserved() {
    let blob = wavetable(16, 7);
    let bytes = PresetBytes::new("Lead1", LEAD_XML).trailer(&blob).build();

    let document = PatchDocument::load_raw(&bytes).unwrap();
    assert_eq!(document.wavetables(), &[blob.clone()]);
    assert_eq!(document.serialize().unwrap(), bytes);
    assert!(bytes.ends_with(&blob));
}

#[test]
fn oversized_program_name_writes_nothing() {
    let dir = PresetDir::new();
    let name = "x".repeat(29);

    let result = ProgramName::new(name.as_str());
    assert!(matches!(result, Err(FxpError::Format(_))));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let multibyte = "é".repeat(15);
    assert!(matches!(
        ProgramName::new(multibyte.as_str()),
        Err(FxpError::Format(_))
    ));
    assert!(ProgramName::new("x".repeat(28)).is_ok());
}

#[test]
fn stale_chunk_size_recovered_by_marker_scan() {
    let trailer = wavetable(32, 1);
    let bytes = PresetBytes::new("Stale", LEAD_XML)
        .chunk_size(0)
        .trailer(&trailer)
        .build();

    let document = PatchDocument::load_raw(&bytes).unwrap();
    assert_eq!(document.xml_payload(), LEAD_XML);
    assert_eq!(document.wavetables(), &[trailer]);
    assert_eq!(document.serialize().unwrap(), bytes);

    // The length-declared reading finds an empty payload but still keeps every byte
    let declared = PatchDocument::load_with_mode(&bytes, SplitMode::LengthDeclared).unwrap();
    assert!(declared.xml_payload().is_empty());
    assert_eq!(declared.warnings(), &[SplitWarning::MissingXmlMarker]);
    assert_eq!(declared.serialize().unwrap(), bytes);
}

#[test]
fn mismatched_chunk_size_is_recorded() {
    let bytes = PresetBytes::new("Off", LEAD_XML)
        .chunk_size(10)
        .trailer(b"WT")
        .build();

    let document = PatchDocument::load_raw(&bytes).unwrap();
    assert_eq!(
        document.warnings(),
        &[SplitWarning::SizeMismatch(SizeMismatch {
            field: SizeField::ChunkSize,
            declared: 10,
            actual: LEAD_XML.len(),
        })]
    );
    assert_eq!(document.serialize().unwrap(), bytes);
}

#[test]
fn pre_xml_prefix_is_kept() {
    let bytes = PresetBytes::new("Prefix", LEAD_XML)
        .pre_xml(b"sub3\x00\x00\x00\x10")
        .trailer(&wavetable(8, 3))
        .build();

    let document = PatchDocument::load_raw(&bytes).unwrap();
    assert_eq!(document.pre_xml(), b"sub3\x00\x00\x00\x10");
    assert_eq!(document.xml_payload(), LEAD_XML);
    assert_eq!(document.serialize().unwrap(), bytes);
}

#[test]
fn serialize_is_idempotent() {
    let bytes = PresetBytes::new("Idem", ORDERED_XML)
        .trailer(&wavetable(64, 9))
        .build();

    let once = PatchDocument::load_raw(&bytes).unwrap().serialize().unwrap();
    let twice = PatchDocument::load_raw(&once).unwrap().serialize().unwrap();
    assert_eq!(once, bytes);
    assert_eq!(twice, once);
}

#[test]
fn header_only_and_truncated_inputs() {
    let bytes = lead_preset();

    let header_only = PatchDocument::load_raw(&bytes[..FXP_HEADER_SIZE]).unwrap();
    assert!(header_only.xml_payload().is_empty());
    assert_eq!(header_only.serialize().unwrap(), &bytes[..FXP_HEADER_SIZE]);

    assert!(matches!(
        PatchDocument::load_raw(&bytes[..FXP_HEADER_SIZE - 1]),
        Err(FxpError::Format(_))
    ));
}

#[test]
fn marker_extraction_ignores_noise_outside_patch() {
    let mut trailer = b"</patch>".to_vec();
    trailer.extend(wavetable(12, 5));
    let bytes = PresetBytes::new("Noise", LEAD_XML).trailer(&trailer).build();

    let document = PatchDocument::load_raw(&bytes).unwrap();
    assert_eq!(document.xml_payload(), LEAD_XML);
    assert_eq!(document.wavetables(), &[trailer]);
}

#[test]
fn parameter_order_survives_extraction_and_interchange() {
    let bytes = PresetBytes::new("Sqweird", ORDERED_XML).build();
    let document = PatchReader::default().read_slice(&bytes).unwrap();
    let view = HumanReadableView::from_document(&document).unwrap();

    let expected = vec!["volume", "a_osc1_type", "scene_active", "filter_cutoff"];
    assert_eq!(view.parameters.names().collect::<Vec<_>>(), expected);

    let json = view.to_interchange_form().unwrap();
    let decoded = HumanReadableView::from_interchange_form(&json).unwrap();
    assert_eq!(decoded.parameters.names().collect::<Vec<_>>(), expected);
    assert_eq!(decoded, view);
}

#[test]
fn preserve_xml_apply_swaps_only_wavetables() {
    let original_blob = wavetable(16, 0);
    let bytes = PresetBytes::new("Lead1", LEAD_XML)
        .trailer(&original_blob)
        .build();
    let mut document = PatchDocument::load_raw(&bytes).unwrap();

    let mut view = HumanReadableView::from_document(&document).unwrap();
    view.parameters.get_mut("cutoff").unwrap().value = Some("0.9".into());
    view.wavetables = vec![wavetable(24, 42)];

    view.apply_wavetables(&mut document).unwrap();

    assert_eq!(document.fidelity(), Fidelity::Edited);
    assert_eq!(document.xml_payload(), LEAD_XML);
    let out = document.serialize().unwrap();
    assert_eq!(&out[..FXP_HEADER_SIZE + LEAD_XML.len()], &bytes[..FXP_HEADER_SIZE + LEAD_XML.len()]);
    assert!(out.ends_with(&wavetable(24, 42)));
}

#[test]
fn unedited_apply_is_byte_identical() {
    let blob = wavetable(16, 4);
    let counted = PresetBytes::new("Lead1", LEAD_XML)
        .byte_size(LEAD_XML.len() as i32 + 16)
        .trailer(&blob)
        .build();
    let stale = PresetBytes::new("Lead1", LEAD_XML)
        .chunk_size(0)
        .trailer(&blob)
        .build();

    for bytes in [counted, stale] {
        let mut document = PatchDocument::load_raw(&bytes).unwrap();
        let json = HumanReadableView::from_document(&document)
            .unwrap()
            .to_interchange_form()
            .unwrap();
        let view = HumanReadableView::from_interchange_form(&json).unwrap();

        view.apply_wavetables(&mut document).unwrap();
        assert_eq!(document.fidelity(), Fidelity::Exact);
        assert_eq!(document.serialize().unwrap(), bytes);

        view.apply_to(&mut document, WriteStrategy::PreserveXml, SizePolicy::XmlLength)
            .unwrap();
        assert_eq!(document.serialize().unwrap(), bytes);
    }
}

#[test]
fn apply_keeps_counted_byte_size_convention() {
    let bytes = PresetBytes::new("Lead1", LEAD_XML)
        .byte_size(LEAD_XML.len() as i32 + 16)
        .trailer(&wavetable(16, 4))
        .build();
    let mut document = PatchDocument::load_raw(&bytes).unwrap();

    let mut view = HumanReadableView::from_document(&document).unwrap();
    view.wavetables = vec![wavetable(40, 8)];
    view.apply_wavetables(&mut document).unwrap();

    let out = document.serialize().unwrap();
    let reloaded = PatchDocument::load_raw(&out).unwrap();
    assert!(reloaded.warnings().is_empty());
    assert_eq!(reloaded.header().byte_size, LEAD_XML.len() as i32 + 40);
    assert_eq!(reloaded.header().chunk_size, LEAD_XML.len() as i32);
}

#[test]
fn render_xml_apply_updates_parameters() {
    let bytes = PresetBytes::new("Lead1", LEAD_XML).trailer(b"WT").build();
    let mut document = PatchDocument::load_raw(&bytes).unwrap();

    let mut view = HumanReadableView::from_document(&document).unwrap();
    view.parameters.get_mut("cutoff").unwrap().value = Some("0.9".into());

    view.apply_to(&mut document, WriteStrategy::RenderXml, SizePolicy::XmlLength)
        .unwrap();

    assert_eq!(document.header().chunk_size as usize, document.xml_payload().len());
    assert_eq!(document.header().byte_size, document.header().chunk_size);

    let reloaded = PatchDocument::load_raw(&document.serialize().unwrap()).unwrap();
    assert!(reloaded.warnings().is_empty());
    let view = HumanReadableView::from_document(&reloaded).unwrap();
    assert_eq!(view.parameters.get("cutoff"), Some(&Parameter::new("f", "0.9")));
    assert_eq!(reloaded.wavetables(), &[b"WT".to_vec()]);
}

#[test]
fn reinterpret_then_reload_is_stable() {
    let bytes = PresetBytes::new("Sqweird", ORDERED_XML)
        .chunk_size(0)
        .trailer(&wavetable(20, 2))
        .build();

    let document = PatchDocument::load_and_reinterpret(&bytes, SizePolicy::XmlAndWavetables).unwrap();
    assert_eq!(document.fidelity(), Fidelity::Reinterpreted);

    let written = document.serialize().unwrap();
    let reloaded = PatchDocument::load_raw(&written).unwrap();
    assert!(reloaded.warnings().is_empty());
    assert_eq!(reloaded.serialize().unwrap(), written);
    assert_eq!(
        HumanReadableView::from_document(&reloaded).unwrap(),
        HumanReadableView::from_document(&PatchDocument::load_raw(&bytes).unwrap()).unwrap()
    );
}

#[test]
fn writer_output_verifies_on_disk() {
    let dir = PresetDir::new();
    let path = dir.path().join("init.fxp");

    let mut writer = PatchWriter::new(ProgramName::new("Init").unwrap())
        .plugin(1, i32::from_be_bytes(*b"cjs3"), 1, 1)
        .size_policy(SizePolicy::XmlAndWavetables);
    writer.add_xml_payload(ORDERED_XML.to_vec()).unwrap();
    writer.add_wavetable(wavetable(100, 1));
    let document = writer.build().unwrap();

    write_file(&document, &path).unwrap();
    let result = RoundTripVerifier::default().verify(&path).unwrap();
    assert!(result.ok);
    assert!(result.warnings.is_empty());

    let reloaded = PatchReader::default().read_file(&path).unwrap();
    assert_eq!(reloaded.header().fx_id, i32::from_be_bytes(*b"cjs3"));
}

#[test]
fn batch_scan_over_preset_tree() {
    let dir = PresetDir::new();
    dir.write("Leads/lead.fxp", &lead_preset());
    dir.write(
        "Basses/Sqweird.fxp",
        &PresetBytes::new("Sqweird", ORDERED_XML)
            .trailer(&wavetable(16, 1))
            .build(),
    );
    dir.write("Basses/truncated.fxp", &lead_preset()[..30]);

    let config = ToolConfig {
        write_extracted: true,
        ..ToolConfig::default()
    };
    let report = batch::scan(dir.path(), &config);

    assert_eq!(report.verified.len(), 2);
    assert_eq!(report.extracted.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("truncated.fxp"));

    let sidecar = std::fs::read_to_string(dir.path().join("Basses/Sqweird_extracted_data.txt")).unwrap();
    assert!(sidecar.contains("volume: type=2 value=0.890903"));
    assert!(sidecar.contains("wavetables: 1 blob(s), 16 bytes"));
}
