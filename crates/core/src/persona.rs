//! Patient Personas
//!
//! A persona is the character sheet the language model plays during a
//! session. The set is fixed at startup: either the built-in patients or a
//! directory of `<KEY>.md` files, and it is never mutated afterwards.

use std::collections::BTreeMap;
use std::path::Path;

/// Errors raised while loading personas from disk.
#[derive(Debug, thiserror::Error)]
pub enum PersonaError {
    #[error("Failed to read persona directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No persona files (*.md) found in {0}")]
    Empty(String),
}

const PERSONA_A: &str = "末期の膵臓がんで、強い痛みを訴える65歳の男性。残された時間を穏やかに過ごしたいと願っているが、病状への不安と家族への心配で揺れている。彼は元エンジニアで、論理的な思考を好む。";

const PERSONA_B: &str = "Bは元高校教諭でALS（筋萎縮性側索硬化症）レベル4の55歳日本人女性、佐藤真理子のハイパーリアリスティックなバストアップポートレート。  \n\
白い病院用ガウンを着てベッドに半坐位で横たわり、四肢には著しい筋萎縮が見られる。  \n\
脇には軽量な手動車椅子、ベッドサイドには補助会話装置用タブレットが設置され、鼻には酸素カニューレ、肩には経管栄養チューブが固定されている。  \n\
頬はこけ、唇はわずかに青白く、細かなシワが刻まれ、目には疲労感と静かな哀愁を帯びた微笑みが浮かんでいる。  \n\
柔らかな臨床用ホワイトライトに優しいリムライトで輪郭を強調。  \n\
浅い被写界深度のバストアップ、背景はIV点滴スタンドとバイタルサインモニターがソフトフォーカスでぼけている。  \n\
8Kフォトリアル、ハイパーディテール、落ち着いたナチュラルカラー。";

const PERSONA_C: &str = "Cは末期膵臓がん患者の68歳日本人男性、田村賢一。気難しい性格で、眉間に深い皺を寄せた苛立ちを帯びた表情。  \n\
白い病院用ガウンを着てベッドに仰臥しつつ、上半身をわずかに起こし、腕を組むかシーツを強く握りしめている。  \n\
急激な体重減少によるこけた頬と黄疸による黄色みがかった肌、疲れた目の下にはくっきりとしたクマ。  \n\
細いIVラインから疼痛管理の薬が投与され、そばにはモルヒネポンプ。  \n\
冷たいホワイトライトの病室照明にわずかなリムライトを効かせ、硬質な空気感を演出。  \n\
浅い被写界深度のバストアップ、背景は淡いグリーンのカーテンと柔らかく光る心電図モニターがソフトフォーカスでぼけている。  \n\
8Kフォトリアル、ハイパーディテール、落ち着いたナチュラルカラー。";

/// An immutable key → persona text mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaSet {
    personas: BTreeMap<String, String>,
}

impl PersonaSet {
    /// Builds a set from explicit key/text pairs.
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            personas: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The three patients shipped with the trainer.
    pub fn builtin() -> Self {
        Self::new([("A", PERSONA_A), ("B", PERSONA_B), ("C", PERSONA_C)])
    }

    /// Loads every `*.md` file in `dir`; the file stem is the persona key.
    pub fn from_dir(dir: &Path) -> Result<Self, PersonaError> {
        let io_err = |source| PersonaError::Io {
            path: dir.display().to_string(),
            source,
        };

        let mut personas = BTreeMap::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path).map_err(io_err)?;
            personas.insert(key.to_string(), text.trim().to_string());
        }

        if personas.is_empty() {
            return Err(PersonaError::Empty(dir.display().to_string()));
        }
        Ok(Self { personas })
    }

    /// Returns the persona text for `key`, if it exists.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.personas.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.personas.keys().map(String::as_str)
    }

    /// Human-readable key list, e.g. `A, B, C`.
    pub fn key_list(&self) -> String {
        self.keys().collect::<Vec<_>>().join(", ")
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}
