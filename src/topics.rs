use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

/// Minimum accumulated keyword score before a topic is considered relevant.
pub const MIN_TOPIC_SCORE: i64 = 2;
/// Maximum topics assigned to any one section.
pub const MAX_TOPICS_PER_SECTION: usize = 5;

/// One entry in the topic taxonomy tree, as loaded from the definitions
/// document.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub children: Vec<TopicDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicsDocument {
    #[serde(default)]
    pub topics: Vec<TopicDefinition>,
}

#[derive(Debug, Clone)]
pub struct TopicSummary {
    pub name: String,
    pub description: String,
}

/// Inverted keyword index over the topic taxonomy.
///
/// Built once per run and read-only afterwards. Keys are lowercase words or
/// multi-word phrases; each maps to the topic ids it is evidence for, in
/// append-only first-writer order so tied scores rank deterministically.
pub struct TopicIndex {
    topics: HashMap<String, TopicSummary>,
    keyword_order: Vec<String>,
    keyword_topics: HashMap<String, Vec<String>>,
    word_pattern: Regex,
}

impl TopicIndex {
    pub fn from_definitions(definitions: &[TopicDefinition]) -> Result<Self> {
        let word_pattern =
            Regex::new(r"[a-z][a-z'-]+").context("failed to compile keyword tokenizer regex")?;

        let mut index = Self {
            topics: HashMap::new(),
            keyword_order: Vec::new(),
            keyword_topics: HashMap::new(),
            word_pattern,
        };

        for definition in definitions {
            index.register_topic(definition);
        }

        for (keyword, topic_id) in CURATED_KEYWORDS {
            let keyword = keyword.to_lowercase();
            if index.topics.contains_key(*topic_id) {
                index.register_keyword(&keyword, topic_id);
            }
        }

        Ok(index)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn keyword_count(&self) -> usize {
        self.keyword_order.len()
    }

    pub fn topic_name(&self, topic_id: &str) -> Option<&str> {
        self.topics.get(topic_id).map(|summary| summary.name.as_str())
    }

    fn register_topic(&mut self, definition: &TopicDefinition) {
        self.topics.insert(
            definition.id.clone(),
            TopicSummary {
                name: definition.name.clone(),
                description: definition.description.clone(),
            },
        );

        for keyword in self.extract_keywords(&definition.name) {
            self.register_keyword(&keyword, &definition.id);
        }

        let name_lower = definition.name.to_lowercase();
        if name_lower.split_whitespace().count() > 1 {
            self.register_keyword(&name_lower, &definition.id);
        }

        for keyword in self.extract_keywords(&definition.description) {
            self.register_keyword(&keyword, &definition.id);
        }

        for child in &definition.children {
            self.register_topic(child);
        }
    }

    fn register_keyword(&mut self, keyword: &str, topic_id: &str) {
        if let Some(topic_ids) = self.keyword_topics.get_mut(keyword) {
            if !topic_ids.iter().any(|existing| existing == topic_id) {
                topic_ids.push(topic_id.to_string());
            }
            return;
        }
        self.keyword_order.push(keyword.to_string());
        self.keyword_topics
            .insert(keyword.to_string(), vec![topic_id.to_string()]);
    }

    fn extract_keywords(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.word_pattern
            .find_iter(&lowered)
            .map(|found| found.as_str().to_string())
            .filter(|word| word.len() > 2 && !STOP_WORDS.contains(&word.as_str()))
            .collect()
    }

    /// Score `title` and `content` against the index and return up to
    /// [`MAX_TOPICS_PER_SECTION`] topic ids, best first. An empty result means
    /// "no assignment", not an error.
    pub fn classify(&self, title: &str, content: &str) -> Vec<String> {
        let title_lower = title.to_lowercase();
        let content_lower = content.to_lowercase();

        let mut scores = ScoreBoard::default();

        // Multi-word phrases first, longest first. Ties keep index insertion
        // order via stable sort.
        let mut phrase_keys = self
            .keyword_order
            .iter()
            .filter(|keyword| keyword.contains(' '))
            .collect::<Vec<&String>>();
        phrase_keys.sort_by_key(|keyword| std::cmp::Reverse(keyword.len()));

        for phrase in phrase_keys {
            let title_hits = title_lower.matches(phrase.as_str()).count() as i64;
            let content_hits = content_lower.matches(phrase.as_str()).count() as i64;
            if title_hits == 0 && content_hits == 0 {
                continue;
            }
            for topic_id in &self.keyword_topics[phrase] {
                scores.add(topic_id, title_hits * 5 + content_hits);
            }
        }

        let title_words = self
            .word_pattern
            .find_iter(&title_lower)
            .map(|found| found.as_str().to_string())
            .collect::<HashSet<String>>();

        let mut content_word_counts = HashMap::<&str, i64>::new();
        for found in self.word_pattern.find_iter(&content_lower) {
            *content_word_counts.entry(found.as_str()).or_insert(0) += 1;
        }

        for keyword in &self.keyword_order {
            if keyword.contains(' ') {
                continue;
            }
            let title_hit = title_words.contains(keyword);
            let content_count = content_word_counts
                .get(keyword.as_str())
                .copied()
                .unwrap_or(0);
            if !title_hit && content_count == 0 {
                continue;
            }
            let points = if title_hit { 5 } else { 0 } + content_count.min(10);
            for topic_id in &self.keyword_topics[keyword] {
                scores.add(topic_id, points);
            }
        }

        scores.ranked(MIN_TOPIC_SCORE, MAX_TOPICS_PER_SECTION)
    }
}

/// Accumulates per-topic scores while remembering first-hit order, so equal
/// scores rank in the order evidence was first seen.
#[derive(Default)]
struct ScoreBoard {
    order: Vec<String>,
    totals: HashMap<String, i64>,
}

impl ScoreBoard {
    fn add(&mut self, topic_id: &str, points: i64) {
        if let Some(total) = self.totals.get_mut(topic_id) {
            *total += points;
            return;
        }
        self.order.push(topic_id.to_string());
        self.totals.insert(topic_id.to_string(), points);
    }

    fn ranked(self, min_score: i64, limit: usize) -> Vec<String> {
        let mut entries = self
            .order
            .into_iter()
            .map(|topic_id| {
                let total = self.totals[&topic_id];
                (topic_id, total)
            })
            .collect::<Vec<(String, i64)>>();

        entries.sort_by_key(|(_, total)| std::cmp::Reverse(*total));
        entries
            .into_iter()
            .filter(|(_, total)| *total >= min_score)
            .take(limit)
            .map(|(topic_id, _)| topic_id)
            .collect()
    }
}

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "in", "to", "for", "is", "its", "it", "as", "at", "by",
    "on", "not", "no", "with", "from", "that", "this", "be", "are", "was", "were", "has", "have",
    "his", "her", "their", "them", "all", "each", "which", "whether", "how", "what", "who", "whom",
];

/// Curated theological keywords mapped to topic ids, beyond what the topic
/// names and descriptions yield automatically. Entries whose topic id is not
/// in the loaded taxonomy are ignored.
const CURATED_KEYWORDS: &[(&str, &str)] = &[
    // Theology Proper
    ("deity", "nature-of-god"),
    ("godhead", "nature-of-god"),
    ("theism", "existence-of-god"),
    ("aseity", "nature-of-god"),
    ("impassibility", "divine-immutability"),
    ("triune", "trinity"),
    ("consubstantial", "trinity"),
    ("homoousios", "trinity"),
    ("filioque", "procession-of-spirit"),
    ("monotheism", "unity-of-god"),
    // Creation and Providence
    ("cosmogony", "creation"),
    ("creatio", "creation"),
    ("nihilo", "creation-ex-nihilo"),
    ("preservation", "divine-providence"),
    ("concurrence", "divine-concurrence"),
    ("decree", "predestination"),
    ("decrees", "predestination"),
    ("foreordination", "predestination"),
    ("elect", "election"),
    ("reprobate", "reprobation"),
    // Scripture and Revelation
    ("bible", "scripture"),
    ("biblical", "scripture"),
    ("canonical", "canon"),
    ("hermeneutics", "interpretation"),
    ("exegesis", "interpretation"),
    ("perspicuity", "clarity"),
    ("infallible", "inerrancy"),
    ("sola scriptura", "sufficiency"),
    // Christology
    ("messiah", "christology"),
    ("messianic", "christology"),
    ("mediator", "offices-of-christ"),
    ("logos", "incarnation"),
    ("theanthropos", "hypostatic-union"),
    ("kenosis", "incarnation"),
    ("chalcedon", "two-natures"),
    ("chalcedonian", "two-natures"),
    ("crucifixion", "passion-of-christ"),
    ("cross", "passion-of-christ"),
    ("calvary", "passion-of-christ"),
    ("propitiation", "atonement"),
    ("expiation", "atonement"),
    ("ransom", "atonement"),
    ("substitution", "penal-substitution"),
    // Soteriology
    ("sola fide", "justification-by-faith-alone"),
    ("sola gratia", "grace"),
    ("impute", "imputation"),
    ("imputed", "imputation"),
    ("righteousness", "justification"),
    ("regenerate", "regeneration"),
    ("born again", "regeneration"),
    ("sanctify", "sanctification"),
    ("holiness", "sanctification"),
    ("persevere", "perseverance"),
    ("assurance", "perseverance"),
    ("glorify", "glorification"),
    ("merit", "merit"),
    ("meritorious", "merit"),
    ("ordo salutis", "soteriology"),
    // Ecclesiology
    ("ecclesia", "nature-of-church"),
    ("church", "nature-of-church"),
    ("clergy", "ministry"),
    ("laity", "priesthood-of-believers"),
    ("bishop", "episcopacy"),
    ("elder", "presbyterianism"),
    ("deacon", "ordained-ministry"),
    ("ordination", "holy-orders"),
    ("excommunication", "church-discipline"),
    ("pope", "papacy"),
    ("papal", "papacy"),
    ("pontiff", "papacy"),
    ("primacy", "papacy"),
    // Sacraments
    ("sacrament", "sacraments"),
    ("sacramental", "sacraments"),
    ("baptize", "baptism"),
    ("baptized", "baptism"),
    ("baptismal", "baptism"),
    ("paedobaptism", "infant-baptism"),
    ("pedobaptism", "infant-baptism"),
    ("credobaptism", "believers-baptism"),
    ("eucharistic", "eucharist"),
    ("communion", "eucharist"),
    ("transubstantiation", "transubstantiation"),
    ("consubstantiation", "consubstantiation"),
    ("real presence", "real-presence"),
    ("sacrament of penance", "penance"),
    ("extreme unction", "anointing"),
    ("confirmation", "confirmation"),
    ("matrimony", "marriage"),
    // Eschatology
    ("parousia", "second-coming"),
    ("millennium", "millennium"),
    ("millenarian", "millennium"),
    ("chiliasm", "premillennialism"),
    ("rapture", "rapture"),
    ("antichrist", "antichrist"),
    ("purgatory", "purgatory"),
    ("limbo", "limbo"),
    ("beatific vision", "beatific-vision"),
    ("resurrection", "resurrection"),
    ("judgment", "final-judgment"),
    ("damnation", "hell"),
    ("eternal punishment", "eternal-punishment"),
    ("annihilation", "annihilationism"),
    ("heaven", "heaven"),
    ("paradise", "paradise"),
    // Moral Theology
    ("natural law", "natural-law"),
    ("decalogue", "moral-precepts"),
    ("commandments", "moral-precepts"),
    ("virtue", "virtues"),
    ("prudence", "prudence"),
    ("temperance", "temperance"),
    ("fortitude", "fortitude"),
    ("justice", "justice"),
    ("charity", "charity-virtue"),
    ("chastity", "sexual-ethics"),
    ("conscience", "conscience"),
    ("casuistry", "conscience"),
    ("just war", "war-and-peace"),
    // Anthropology
    ("imago dei", "image-of-god"),
    ("image of god", "image-of-god"),
    ("soul", "soul-and-body"),
    ("intellect", "human-faculties"),
    ("concupiscence", "concupiscence"),
    ("total depravity", "effects-of-sin"),
    ("bondage of the will", "free-will-after-fall"),
    // Pneumatology
    ("paraclete", "person-of-spirit"),
    ("charism", "charismatic-gifts"),
    ("tongues", "charismatic-gifts"),
    ("prophecy", "prophecy"),
    // Angels
    ("angel", "nature-of-angels"),
    ("angelic", "nature-of-angels"),
    ("demon", "demons"),
    ("demonic", "demons"),
    ("devil", "satan"),
    ("satan", "satan"),
    ("seraph", "angelic-orders"),
    ("cherub", "angelic-orders"),
    // Mariology
    ("theotokos", "theotokos"),
    ("immaculate conception", "immaculate-conception"),
    ("assumption", "assumption"),
    ("marian", "mariology"),
    // Prayer and Spiritual Life
    ("prayer", "prayer"),
    ("contemplation", "contemplation"),
    ("meditation", "meditation"),
    ("mystical", "mystical-experiences"),
    ("ascetical", "ascetical-theology"),
    ("monasticism", "monasticism"),
    ("religious life", "religious-life"),
    ("vow", "vows"),
    ("vows", "vows"),
    // Liturgy
    ("liturgy", "liturgical-theology"),
    ("liturgical", "liturgical-theology"),
    ("worship", "worship"),
    ("mass", "mass"),
    ("icon", "sacred-art"),
    ("idolatry", "idolatry"),
    ("idols", "idolatry"),
];
