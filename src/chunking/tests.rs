use super::sentences::split_sentences;
use super::structure::{ElementClass, StructureState};
use super::*;

fn pipeline(max_tokens: usize, overlap_tokens: usize) -> ChunkPipeline {
    let config = ChunkingConfig::new(max_tokens, overlap_tokens).expect("valid config");
    ChunkPipeline::new(config).expect("pipeline compiles")
}

fn detector() -> StructureDetector {
    StructureDetector::new().expect("detector compiles")
}

fn texts(chunks: &[Chunk]) -> Vec<&str> {
    chunks.iter().map(|chunk| chunk.chunk_text.as_str()).collect()
}

fn title(text: &str) -> ParsedElement {
    ParsedElement::new(text).with_category(ElementCategory::Title)
}

fn body_sentences(chunk: &Chunk, heading: &str) -> Vec<String> {
    let body = chunk
        .chunk_text
        .strip_prefix(heading)
        .expect("chunk starts with its heading");
    split_sentences(body)
}

/// The next chunk opens with the last one or two sentences of the previous one.
fn carries_overlap(previous: &[String], next: &[String]) -> bool {
    (1..=2).any(|carried| {
        carried <= previous.len()
            && carried <= next.len()
            && next[..carried] == previous[previous.len() - carried..]
    })
}

#[test]
fn normalize_strips_boilerplate_and_repairs_wrapped_words() {
    let normalizer = TextNormalizer::new().expect("normalizer compiles");
    let raw = "Page 3 of 10\nThe insured  person\nUIN: IRDAN123RP0001\nACME General Insurance Co. Ltd.\nshall be cov-\nered";

    assert_eq!(
        normalizer.normalize(raw, DocKind::Generic),
        "The insured person shall be covered"
    );
}

#[test]
fn normalize_removes_disclaimers_and_version_tags() {
    let normalizer = TextNormalizer::new().expect("normalizer compiles");

    assert_eq!(
        normalizer.normalize(
            "This document is for information only. Claims are paid within 30 days. All rights reserved.",
            DocKind::Generic,
        ),
        "Claims are paid within 30 days."
    );
    assert_eq!(
        normalizer.normalize("Policy wording Version 2.1", DocKind::Generic),
        "Policy wording"
    );
    assert_eq!(
        normalizer.normalize("Confidential\nBenefits table", DocKind::Generic),
        "Benefits table"
    );
    assert_eq!(
        normalizer.normalize("pre-existing diseases", DocKind::Generic),
        "pre-existing diseases"
    );
}

#[test]
fn normalize_applies_document_kind_specific_cleanup() {
    let normalizer = TextNormalizer::new().expect("normalizer compiles");

    assert_eq!(
        normalizer.normalize(
            "Please find the policy attached.\nBest regards,\nRavi",
            DocKind::Email
        ),
        "Please find the policy attached."
    );
    assert_eq!(
        normalizer.normalize("Sum insured [FIELD_1] is {amount} payable", DocKind::WordProcessor),
        "Sum insured is payable"
    );
    assert_eq!(
        normalizer.normalize("Sum insured [FIELD_1] is payable", DocKind::Generic),
        "Sum insured [FIELD_1] is payable"
    );
}

#[test]
fn normalize_is_idempotent() {
    let normalizer = TextNormalizer::new().expect("normalizer compiles");
    let samples = [
        ("Page 1 of 4\nSECTION 1:   DEFINITIONS\nHos-\npital means", DocKind::Generic),
        ("UIN: ABC123XYZ\nStar Health Co. Ltd.\nConfidential\nBenefits apply", DocKind::Generic),
        ("See the attached policy.\n-- \nSent from my phone", DocKind::Email),
        ("On Monday, Priya wrote:\n> old text", DocKind::Email),
        ("Clause {ref} applies [see note] here", DocKind::WordProcessor),
        ("a- b- c all rights reserved", DocKind::Generic),
        ("", DocKind::Generic),
    ];

    for (raw, kind) in samples {
        let once = normalizer.normalize(raw, kind);
        let twice = normalizer.normalize(&once, kind);
        assert_eq!(once, twice, "normalization not idempotent for {raw:?}");
    }
}

#[test]
fn split_sentences_respects_abbreviations_and_markers() {
    assert_eq!(
        split_sentences("Rs. 5000 is payable. The limit applies per year."),
        vec!["Rs. 5000 is payable.", "The limit applies per year."]
    );
    assert_eq!(
        split_sentences("1. Hospital means a place. 2. Nursing home means another."),
        vec!["1. Hospital means a place.", "2. Nursing home means another."]
    );
    assert_eq!(
        split_sentences("Conditions are not covered. a) Maternity is excluded."),
        vec!["Conditions are not covered.", "a) Maternity is excluded."]
    );
    assert_eq!(
        split_sentences("as described in (a) above the limit applies"),
        vec!["as described in (a) above the limit applies"]
    );
}

#[test]
fn detector_predicates_classify_headings_and_clauses() {
    let detector = detector();

    assert!(detector.is_heading("SECTION 1: DEFINITIONS", ElementCategory::Other));
    assert!(detector.is_heading("SECTION 4 EXCLUSIONS", ElementCategory::Other));
    assert!(detector.is_heading("Article 5 - Claims Procedure", ElementCategory::Other));
    assert!(detector.is_heading("Chapter 2", ElementCategory::Other));
    assert!(!detector.is_heading(
        "Section 4.2 shall not apply to day care.",
        ElementCategory::Other
    ));
    assert!(detector.is_heading("3. EXCLUSIONS", ElementCategory::Other));
    assert!(detector.is_heading("4.2 Waiting Period", ElementCategory::Other));
    assert!(detector.is_heading("GENERAL CONDITIONS", ElementCategory::Other));
    assert!(detector.is_heading("Benefits", ElementCategory::Title));
    assert!(!detector.is_heading("1. Hospital means an institution", ElementCategory::Other));
    assert!(!detector.is_heading("4.2 Claims are settled in 30 days.", ElementCategory::Other));
    assert!(!detector.is_heading("ICU COVER", ElementCategory::Other));
    assert!(!detector.is_heading("GENERAL CONDITIONS", ElementCategory::Table));

    assert_eq!(detector.clause_marker("a) Maternity"), Some("a)"));
    assert_eq!(detector.clause_marker("(iv) Dental"), Some("(iv)"));
    assert_eq!(detector.clause_marker("iv. Dental"), Some("iv."));
    assert_eq!(detector.clause_marker("12. Hospital"), Some("12."));
    assert_eq!(detector.clause_marker("Code - Excl01 Obesity"), Some("Code - Excl01"));
    assert_eq!(detector.clause_marker("1.5 lakh is the limit"), None);
    assert_eq!(detector.clause_marker("Hospital means"), None);

    assert_eq!(
        detector.qualifiers("Subject to the limits, maternity is NOT covered"),
        vec!["subject to".to_string(), "not covered".to_string()]
    );
}

#[test]
fn heading_wins_over_clause_marker() {
    let detector = detector();
    assert_eq!(
        detector.classify("3. EXCLUSIONS", ElementCategory::Other),
        ElementClass::Heading
    );
}

#[test]
fn detect_definitions_scenario() {
    let elements = vec![
        ParsedElement::new("SECTION 1: DEFINITIONS"),
        ParsedElement::new("1. Hospital means an institution..."),
        ParsedElement::new("2. Ambulance means..."),
    ];

    let records = detector().detect(&elements);
    assert_eq!(records.len(), 3);

    assert_eq!(records[0].kind, RecordKind::Heading);
    assert_eq!(records[0].clause, None);
    assert_eq!(records[0].heading.as_deref(), Some("SECTION 1: DEFINITIONS"));
    assert_eq!(records[0].section.as_deref(), Some("SECTION 1: DEFINITIONS"));

    assert_eq!(records[1].kind, RecordKind::Clause);
    assert_eq!(records[1].clause.as_deref(), Some("1."));
    assert_eq!(records[2].clause.as_deref(), Some("2."));
    assert!(records.iter().all(|record| record.page == 1));
    assert!(
        records
            .iter()
            .all(|record| record.heading.as_deref() == Some("SECTION 1: DEFINITIONS"))
    );
}

#[test]
fn qualifier_is_active_for_following_clause() {
    let elements = vec![
        ParsedElement::new("Exclusions: pre-existing conditions are not covered."),
        ParsedElement::new("a) Maternity is excluded."),
    ];

    let records = detector().detect(&elements);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, RecordKind::Text);
    assert!(records[0].context.contains(&"not covered".to_string()));
    assert_eq!(records[1].clause.as_deref(), Some("a)"));
    assert!(records[1].context.contains(&"not covered".to_string()));
}

#[test]
fn keyword_sentence_does_not_reset_context() {
    let elements = vec![
        ParsedElement::new("SECTION 5: EXCLUSIONS"),
        ParsedElement::new("Cosmetic surgery is not covered."),
        ParsedElement::new("Section 4.2 shall not apply to day care."),
    ];

    let records = detector().detect(&elements);
    assert_eq!(records[2].kind, RecordKind::Text);
    assert_eq!(records[2].section.as_deref(), Some("SECTION 5: EXCLUSIONS"));
    assert_eq!(records[2].context, vec!["not covered".to_string()]);
}

#[test]
fn qualifiers_accumulate_every_match() {
    let elements = vec![
        ParsedElement::new("Exclusions apply as listed."),
        ParsedElement::new("Further exclusions are not covered."),
    ];

    let records = detector().detect(&elements);
    assert_eq!(records[0].context, vec!["exclusions".to_string()]);
    assert_eq!(
        records[1].context,
        vec![
            "exclusions".to_string(),
            "exclusions".to_string(),
            "not covered".to_string(),
        ]
    );
}

#[test]
fn heading_clears_context_but_keeps_clause() {
    let elements = vec![
        ParsedElement::new("Benefits are subject to the waiting period."),
        ParsedElement::new("a) Cataract is payable after two years."),
        ParsedElement::new("SECTION 4: CLAIMS"),
        ParsedElement::new("Claims are settled within thirty days."),
    ];

    let records = detector().detect(&elements);
    assert_eq!(records[1].context, vec!["subject to".to_string()]);
    assert_eq!(records[2].kind, RecordKind::Heading);
    assert!(records[2].context.is_empty());
    assert_eq!(records[2].clause, None);
    assert!(records[3].context.is_empty());
    assert_eq!(records[3].clause.as_deref(), Some("a)"));
    assert_eq!(records[3].section.as_deref(), Some("SECTION 4: CLAIMS"));
}

#[test]
fn detect_skips_empty_elements_without_touching_state() {
    let elements = vec![
        ParsedElement::new("Room rent is capped.").with_page(2),
        ParsedElement::new("   ").with_page(7),
        ParsedElement::new(""),
        ParsedElement::new("ICU charges are payable."),
        ParsedElement::new("Ambulance cover applies.").with_page(3),
    ];

    let records = detector().detect(&elements);
    let non_empty = elements
        .iter()
        .filter(|element| !element.text.trim().is_empty())
        .count();
    assert_eq!(records.len(), non_empty);
    assert_eq!(
        records.iter().map(|record| record.page).collect::<Vec<u32>>(),
        vec![2, 2, 3]
    );
}

#[test]
fn step_is_a_pure_transition() {
    let detector = detector();
    let state = StructureState::default();
    let element = ParsedElement::new("GENERAL EXCLUSIONS").with_page(5);

    let (first_state, first_record) = detector.step(state.clone(), &element);
    let (second_state, second_record) = detector.step(state, &element);

    assert_eq!(first_state, second_state);
    assert_eq!(first_record, second_record);
    assert_eq!(first_state.page, 5);
    assert_eq!(first_state.heading.as_deref(), Some("GENERAL EXCLUSIONS"));
}

#[test]
fn annexure_seeds_missing_section() {
    let elements = vec![
        ParsedElement::new("Annexure I - List of day care procedures"),
        ParsedElement::new("Cataract surgery is payable."),
    ];

    let records = detector().detect(&elements);
    assert_eq!(records[0].kind, RecordKind::Annex);
    assert_eq!(
        records[0].section.as_deref(),
        Some("Annexure I - List of day care procedures")
    );
    assert_eq!(records[1].heading, records[0].heading);
}

#[test]
fn definitions_scenario_yields_single_chunk() {
    let elements = vec![
        ParsedElement::new("SECTION 1: DEFINITIONS"),
        ParsedElement::new("1. Hospital means an institution..."),
        ParsedElement::new("2. Ambulance means..."),
    ];

    let document = pipeline(500, 100).run(&elements, DocKind::Generic);
    assert_eq!(
        texts(&document.chunks),
        vec!["SECTION 1: DEFINITIONS 1. Hospital means an institution... 2. Ambulance means..."]
    );

    let metadata = &document.chunks[0].metadata;
    assert_eq!(metadata.section.as_deref(), Some("SECTION 1: DEFINITIONS"));
    assert_eq!(metadata.clause.as_deref(), Some("1."));
    assert_eq!(metadata.page, 1);
    assert!(metadata.references.is_empty());
}

#[test]
fn qualifiers_prefix_chunk_text() {
    let elements = vec![
        title("GENERAL EXCLUSIONS"),
        ParsedElement::new(
            "Exclusions: pre-existing conditions are not covered. a) Maternity is excluded.",
        ),
    ];

    let document = pipeline(500, 100).run(&elements, DocKind::Generic);
    assert_eq!(
        texts(&document.chunks),
        vec![
            "[exclusions] [not covered] GENERAL EXCLUSIONS Exclusions: pre-existing conditions are not covered. a) Maternity is excluded."
        ]
    );
    assert_eq!(
        document.chunks[0].metadata.context,
        vec!["exclusions".to_string(), "not covered".to_string()]
    );
}

#[test]
fn clause_boundaries_are_respected_with_overlap() {
    let elements = vec![
        ParsedElement::new("SECTION 3: CLAIMS"),
        ParsedElement::new("a) Notify the insurer within seven days."),
        ParsedElement::new("b) Submit the original bills and reports."),
        ParsedElement::new("c) Provide the discharge summary signed by doctor."),
    ];

    let document = pipeline(20, 8).run(&elements, DocKind::Generic);
    assert_eq!(
        texts(&document.chunks),
        vec![
            "SECTION 3: CLAIMS a) Notify the insurer within seven days. b) Submit the original bills and reports.",
            "SECTION 3: CLAIMS b) Submit the original bills and reports. c) Provide the discharge summary signed by doctor.",
        ]
    );
    assert_eq!(document.chunks[0].metadata.clause.as_deref(), Some("a)"));
    assert_eq!(document.chunks[1].metadata.clause.as_deref(), Some("c)"));
}

#[test]
fn long_sections_stay_bounded_and_overlap() {
    let heading = "SECTION 2: BENEFITS";
    let mut elements = vec![ParsedElement::new(heading)];
    for index in 1..=30 {
        elements.push(ParsedElement::new(format!(
            "Sentence number {index} describes a covered benefit clearly."
        )));
    }

    let (max_tokens, overlap_tokens) = (40, 10);
    let document = pipeline(max_tokens, overlap_tokens).run(&elements, DocKind::Generic);
    assert!(document.chunks.len() > 1);

    for chunk in &document.chunks {
        assert!(token_count(&chunk.chunk_text) <= max_tokens + overlap_tokens);
        assert!(chunk.chunk_text.starts_with(heading));
    }

    for pair in document.chunks.windows(2) {
        let previous = body_sentences(&pair[0], heading);
        let next = body_sentences(&pair[1], heading);
        assert!(
            carries_overlap(&previous, &next),
            "{:?} does not continue {:?}",
            pair[1].chunk_text,
            pair[0].chunk_text
        );
    }

    for index in 1..=30 {
        let needle = format!("number {index} describes");
        assert!(
            document
                .chunks
                .iter()
                .any(|chunk| chunk.chunk_text.contains(&needle)),
            "sentence {index} dropped"
        );
    }
}

#[test]
fn overlap_carries_sentences_longer_than_overlap_budget() {
    let heading = "SECTION 2: BENEFITS";
    let filler = vec!["wording"; 109].join(" ");
    let mut elements = vec![ParsedElement::new(heading)];
    for index in 1..=6 {
        elements.push(ParsedElement::new(format!(
            "Sentence {index} {filler} ends here."
        )));
    }

    let document = pipeline(DEFAULT_MAX_TOKENS, DEFAULT_OVERLAP_TOKENS)
        .run(&elements, DocKind::Generic);
    assert_eq!(document.chunks.len(), 2);

    for chunk in &document.chunks {
        assert!(token_count(&chunk.chunk_text) <= DEFAULT_MAX_TOKENS + DEFAULT_OVERLAP_TOKENS);
    }

    let first = body_sentences(&document.chunks[0], heading);
    let second = body_sentences(&document.chunks[1], heading);
    assert_eq!(first.len(), 4);
    assert!(carries_overlap(&first, &second));
    assert!(second[0].starts_with("Sentence 3 "));
    assert!(second[1].starts_with("Sentence 4 "));
    assert!(second.last().is_some_and(|last| last.starts_with("Sentence 6 ")));
}

#[test]
fn numbered_table_rows_stay_standalone() {
    let elements = vec![
        title("Benefits"),
        ParsedElement::new("Hospitalisation expenses are payable."),
        ParsedElement::new("1. Room rent | 1% of sum insured | per day")
            .with_category(ElementCategory::Table),
        ParsedElement::new("Claims must be intimated within 30 days."),
    ];

    let document = pipeline(500, 100).run(&elements, DocKind::Generic);
    assert_eq!(
        document
            .records
            .iter()
            .map(|record| record.kind)
            .collect::<Vec<RecordKind>>(),
        vec![
            RecordKind::Heading,
            RecordKind::Text,
            RecordKind::Table,
            RecordKind::Text,
        ]
    );
    assert_eq!(
        texts(&document.chunks),
        vec![
            "Benefits Hospitalisation expenses are payable.",
            "1. Room rent | 1% of sum insured | per day",
            "Benefits Claims must be intimated within 30 days.",
        ]
    );

    let detector = detector();
    for row in ["a) ICU | 2%", "iv. Dental | 10%", "Code - Excl01 | Obesity"] {
        assert!(matches!(
            detector.classify(row, ElementCategory::Table),
            ElementClass::Body {
                kind: RecordKind::Table,
                ..
            }
        ));
    }
}

#[test]
fn tables_are_standalone_chunks_in_document_order() {
    let elements = vec![
        title("Benefits"),
        ParsedElement::new("Hospitalisation expenses are payable."),
        ParsedElement::new("Plan A | Sum insured 5 lakh | Room rent 1%")
            .with_category(ElementCategory::Table),
        ParsedElement::new("Claims must be intimated within 30 days."),
    ];

    let document = pipeline(500, 100).run(&elements, DocKind::Generic);
    assert_eq!(
        texts(&document.chunks),
        vec![
            "Benefits Hospitalisation expenses are payable.",
            "Plan A | Sum insured 5 lakh | Room rent 1%",
            "Benefits Claims must be intimated within 30 days.",
        ]
    );
}

#[test]
fn list_items_flush_with_two_item_overlap() {
    let elements = vec![
        title("Day care list"),
        ParsedElement::new("Cataract surgery is included").with_category(ElementCategory::ListItem),
        ParsedElement::new("Dialysis sessions are included")
            .with_category(ElementCategory::ListItem),
        ParsedElement::new("Chemotherapy cycles are included")
            .with_category(ElementCategory::ListItem),
        ParsedElement::new("Radiotherapy sessions are included")
            .with_category(ElementCategory::ListItem),
    ];

    let document = pipeline(10, 2).run(&elements, DocKind::Generic);
    assert_eq!(
        texts(&document.chunks),
        vec![
            "Cataract surgery is included Dialysis sessions are included Chemotherapy cycles are included",
            "Dialysis sessions are included Chemotherapy cycles are included Radiotherapy sessions are included",
        ]
    );
}

#[test]
fn annexure_text_forces_flush() {
    let elements = vec![
        title("Claims procedure"),
        ParsedElement::new("Submit the claim form."),
        ParsedElement::new("Annexure II lists the required documents."),
        ParsedElement::new("Payment follows approval."),
    ];

    let document = pipeline(500, 100).run(&elements, DocKind::Generic);
    assert_eq!(
        texts(&document.chunks),
        vec![
            "Claims procedure Submit the claim form.",
            "Annexure II lists the required documents.",
            "Claims procedure Payment follows approval.",
        ]
    );
}

#[test]
fn heading_only_sections_are_kept() {
    let elements = vec![
        title("Part A"),
        title("Definitions"),
        ParsedElement::new("Hospital means a registered institution."),
    ];

    let document = pipeline(500, 100).run(&elements, DocKind::Generic);
    assert_eq!(
        texts(&document.chunks),
        vec!["Part A", "Definitions Hospital means a registered institution."]
    );
}

#[test]
fn unstructured_text_degrades_to_flat_section() {
    let elements = (1..=12)
        .map(|index| ParsedElement::new(format!("plain paragraph {index} without any structure here.")))
        .collect::<Vec<ParsedElement>>();

    let document = pipeline(20, 5).run(&elements, DocKind::Generic);
    assert!(document.chunks.len() > 1);
    assert!(document.records.iter().all(|record| record.heading.is_none()));
    assert!(document.chunks.iter().all(|chunk| chunk.heading.is_none()));
    assert!(
        document
            .chunks
            .iter()
            .all(|chunk| token_count(&chunk.chunk_text) <= 25)
    );
}

#[test]
fn oversized_sentence_is_never_split() {
    let sentence = "This single sentence runs well beyond the configured window size and must survive intact as one chunk.";
    let elements = vec![ParsedElement::new(sentence)];

    let document = pipeline(10, 2).run(&elements, DocKind::Generic);
    assert_eq!(texts(&document.chunks), vec![sentence]);
    assert_eq!(document.stats.oversized_chunk_count, 1);
}

#[test]
fn empty_input_yields_no_chunks() {
    let document = pipeline(500, 100).run(&[], DocKind::Generic);
    assert!(document.records.is_empty());
    assert!(document.chunks.is_empty());

    let blanks = vec![ParsedElement::new("  "), ParsedElement::new("Page 2 of 9")];
    let document = pipeline(500, 100).run(&blanks, DocKind::Generic);
    assert!(document.chunks.is_empty());
    assert_eq!(document.stats.dropped_element_count, 2);
}

#[test]
fn invalid_config_is_rejected() {
    assert!(ChunkingConfig::new(0, 0).is_err());
    assert!(ChunkingConfig::new(10, 10).is_err());
    assert!(ChunkingConfig::new(10, 3).is_ok());
    assert_eq!(ChunkingConfig::default().max_tokens(), DEFAULT_MAX_TOKENS);
}

#[test]
fn cross_references_are_attached() {
    let elements = vec![
        ParsedElement::new("See Section 4.2 for details"),
        ParsedElement::new("Claims are payable."),
    ];

    let document = pipeline(500, 100).run(&elements, DocKind::Generic);
    assert_eq!(document.chunks.len(), 1);
    assert_eq!(
        document.chunks[0].metadata.references,
        vec!["See Section 4.2".to_string()]
    );
    assert_eq!(document.stats.reference_count, 1);

    let extractor = ReferenceExtractor::new().expect("extractor compiles");
    assert_eq!(
        extractor.references("Refer to Clause A-1 and see section 7. See section for more."),
        vec!["Refer to Clause A-1".to_string(), "see section 7".to_string()]
    );
}

#[test]
fn cross_reference_ids_match_in_any_case() {
    let extractor = ReferenceExtractor::new().expect("extractor compiles");

    assert_eq!(
        extractor.references("Please refer to clause a-1 and see section iv for details."),
        vec!["refer to clause a-1".to_string(), "see section iv".to_string()]
    );
    assert_eq!(
        extractor.references("SEE SECTION IV. Refer To Clause 7a applies."),
        vec!["SEE SECTION IV".to_string(), "Refer To Clause 7a".to_string()]
    );
    assert!(extractor.references("see section for more").is_empty());
}

#[test]
fn element_json_accepts_missing_and_unknown_categories() {
    let raw = r#"[
        {"text": "SECTION 1", "category": "Title", "page_number": 1},
        {"text": "Body", "category": "NarrativeText"},
        {"text": "Row", "category": null},
        {"text": "Item", "category": "ListItem"}
    ]"#;

    let elements: Vec<ParsedElement> = serde_json::from_str(raw).expect("elements parse");
    assert_eq!(elements[0].category, ElementCategory::Title);
    assert_eq!(elements[0].page_number, Some(1));
    assert_eq!(elements[1].category, ElementCategory::Other);
    assert_eq!(elements[2].category, ElementCategory::Other);
    assert_eq!(elements[3].category, ElementCategory::ListItem);
}
