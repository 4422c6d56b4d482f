use persona_report::scoring::{
    normalize, PersonaConfig, PersonaMatch, PersonaResolver, PersonaRule, TopSkillConfig,
    TopSkillSelector, DEFAULT_PERSONA,
};
use persona_report::{
    derive_profile, AgeBracket, AppConfig, Budget, DominantSkillSet, FormSubmission, Market,
    ReportError, ReportSnapshot, ScoringPipeline, Skill, SkillScores, Workstyle,
};

fn scores(values: [u8; 6]) -> SkillScores {
    SkillScores {
        communication: values[0],
        creative: values[1],
        strategy: values[2],
        technical: values[3],
        eq: values[4],
        learning: values[5],
    }
}

fn submission(values: [u8; 6]) -> FormSubmission {
    FormSubmission {
        name: "Grace Hopper".to_string(),
        email: "grace@example.com".to_string(),
        consent: true,
        scores: scores(values),
        workstyle: vec![Workstyle::Build, Workstyle::Advise],
        time_per_week_hours: 6,
        budget_level: Budget::Medium,
        age_bracket: AgeBracket::From45To59,
        markets: vec![Market::B2bSaas, Market::Education],
        wildcards: "Retired naval officer".to_string(),
        constraints: String::new(),
    }
}

#[test]
fn storyteller_strategist_resolves_to_narrative_architect() {
    let profile = ScoringPipeline::default()
        .score(&scores([9, 8, 9, 3, 4, 5]))
        .unwrap();

    assert_eq!(profile.normalized.communication, 90);
    assert_eq!(profile.normalized.creative, 80);
    assert_eq!(
        profile.dominant.as_slice(),
        &[Skill::Communication, Skill::Strategy, Skill::Creative]
    );
    assert_eq!(profile.persona, "Narrative Architect");
    assert_eq!(profile.matched_by, PersonaMatch::Full);
}

#[test]
fn flat_profile_keeps_enumeration_order() {
    let profile = ScoringPipeline::default()
        .score(&SkillScores::uniform(5))
        .unwrap();

    assert_eq!(
        profile.dominant.as_slice(),
        &[Skill::Communication, Skill::Creative, Skill::Strategy]
    );
    assert_eq!(profile.persona, "Narrative Architect");
}

#[test]
fn normalization_is_exact_for_every_rating() {
    for rating in 0..=10u8 {
        let normalized = normalize(&SkillScores::uniform(rating));
        for (_, value) in normalized.iter() {
            assert_eq!(value, rating * 10);
        }
    }
}

#[test]
fn dominant_set_is_always_between_one_and_three() {
    let pipeline = ScoringPipeline::default();
    let samples = [
        [0, 0, 0, 0, 0, 0],
        [10, 10, 10, 10, 10, 10],
        [10, 0, 0, 0, 0, 0],
        [1, 2, 3, 4, 5, 6],
        [7, 7, 2, 7, 7, 1],
        [3, 9, 1, 9, 2, 8],
    ];
    for values in samples {
        let profile = pipeline.score(&scores(values)).unwrap();
        let len = profile.dominant.len();
        assert!((1..=3).contains(&len), "{:?} gave {} skills", values, len);
    }
}

#[test]
fn lone_leader_is_paired_with_runner_up() {
    let profile = ScoringPipeline::default()
        .score(&scores([2, 1, 3, 10, 1, 1]))
        .unwrap();

    assert_eq!(
        profile.dominant.as_slice(),
        &[Skill::Technical, Skill::Strategy]
    );
    assert_eq!(profile.persona, "System Builder");
}

#[test]
fn ties_at_the_margin_are_included_then_capped() {
    // creative, technical, eq all sit exactly at top - 10.
    let profile = ScoringPipeline::default()
        .score(&scores([9, 8, 2, 8, 8, 1]))
        .unwrap();

    assert_eq!(
        profile.dominant.as_slice(),
        &[Skill::Communication, Skill::Creative, Skill::Technical]
    );
}

#[test]
fn three_skill_persona_beats_two_skill_matches() {
    let profile = ScoringPipeline::default()
        .score(&scores([9, 2, 9, 3, 9, 4]))
        .unwrap();

    assert!(profile.dominant.contains(Skill::Eq));
    assert!(profile.dominant.contains(Skill::Strategy));
    assert!(profile.dominant.contains(Skill::Communication));
    assert_eq!(profile.persona, "Community Catalyst");
}

#[test]
fn partial_overlap_and_default_fallback() {
    let resolver = PersonaResolver::new(PersonaConfig {
        default_persona: DEFAULT_PERSONA.to_string(),
        rules: vec![PersonaRule::new(
            "Research Lead",
            &[Skill::Learning, Skill::Technical],
        )],
    });

    let partial = resolver.resolve_detailed(&DominantSkillSet::from(vec![
        Skill::Learning,
        Skill::Eq,
    ]));
    assert_eq!(partial.persona, "Research Lead");
    assert_eq!(partial.matched_by, PersonaMatch::Partial { matched: 1 });

    let fallback = resolver.resolve_detailed(&DominantSkillSet::from(vec![Skill::Creative]));
    assert_eq!(fallback.persona, DEFAULT_PERSONA);
    assert_eq!(fallback.matched_by, PersonaMatch::Default);
}

#[test]
fn scoring_is_deterministic() {
    let pipeline = ScoringPipeline::default();
    let input = scores([6, 7, 8, 7, 6, 5]);
    let first = pipeline.score(&input).unwrap();
    for _ in 0..10 {
        assert_eq!(pipeline.score(&input).unwrap(), first);
    }
}

#[test]
fn custom_thresholds_flow_through_config() {
    let mut config = AppConfig::default();
    config.scoring = TopSkillConfig {
        primary_threshold: 90,
        secondary_margin: 0,
        min_dominant: 1,
        max_dominant: 2,
    };
    let profile = ScoringPipeline::from_config(&config)
        .score(&scores([9, 8, 9, 3, 4, 5]))
        .unwrap();
    assert_eq!(
        profile.dominant.as_slice(),
        &[Skill::Communication, Skill::Strategy]
    );

    let selector = TopSkillSelector::new(config.scoring.clone());
    assert_eq!(selector.select(&profile.normalized), profile.dominant);
}

#[test]
fn cli_score_pairs_out_of_range_fail_before_scoring() {
    let err = SkillScores::parse_pairs(
        "communication=30,creative=8,strategy=9,technical=3,eq=4,learning=200",
    )
    .unwrap_err();
    assert!(err.contains("out of range"));

    let unchecked = scores([30, 8, 9, 3, 4, 200]);
    assert!(matches!(
        ScoringPipeline::default().score(&unchecked),
        Err(ReportError::Validation(_))
    ));
}

#[test]
fn derive_profile_rejects_invalid_forms() {
    let config = AppConfig::default();
    let mut form = submission([9, 8, 9, 3, 4, 5]);
    form.markets.clear();
    assert!(matches!(
        derive_profile(&form, &config),
        Err(ReportError::Validation(_))
    ));

    let mut form = submission([9, 8, 9, 3, 4, 5]);
    form.scores.eq = 11;
    assert!(matches!(
        derive_profile(&form, &config),
        Err(ReportError::Validation(_))
    ));
}

#[test]
fn snapshot_carries_derived_facts() {
    let form = submission([2, 1, 3, 10, 1, 1]);
    let profile = derive_profile(&form, &AppConfig::default()).unwrap();
    let snapshot = ReportSnapshot::new(&form, &profile);

    let encoded = snapshot.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(value["persona"], "System Builder");
    assert_eq!(value["topSkills"], serde_json::json!(["technical", "strategy"]));
    assert_eq!(value["markets"], serde_json::json!(["B2B SaaS", "Education"]));
    assert_eq!(value["scores"]["technical"], 100);
    assert_eq!(value["consent"], true);

    assert_eq!(ReportSnapshot::from_json(&encoded).unwrap(), snapshot);
}

#[test]
fn submission_parses_from_form_json() {
    let raw = r#"{
        "name": "Lin",
        "email": "lin@example.org",
        "consent": true,
        "scores": {"communication": 4, "creative": 9, "strategy": 5,
                   "technical": 8, "eq": 3, "learning": 7},
        "workstyle": ["Create"],
        "time_per_week_hours": 12,
        "budget_level": "high",
        "age_bracket": "18-29",
        "markets": ["Creators", "Local Services"]
    }"#;
    let form: FormSubmission = serde_json::from_str(raw).unwrap();
    assert!(form.wildcards.is_empty());

    let profile = derive_profile(&form, &AppConfig::default()).unwrap();
    assert_eq!(
        profile.dominant.as_slice(),
        &[Skill::Creative, Skill::Technical, Skill::Learning]
    );
}
