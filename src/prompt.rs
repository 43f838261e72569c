use chrono::{DateTime, Utc};
use chrono_tz::{Asia::Seoul, Tz};

/// The fixed set of topics every digest covers, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    WorldAffairs,
    UsStocks,
    KidneyCancer,
    AiAgents,
    TrendingWorks,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::WorldAffairs,
        Category::UsStocks,
        Category::KidneyCancer,
        Category::AiAgents,
        Category::TrendingWorks,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::WorldAffairs => "국제정세",
            Category::UsStocks => "미국 주식시장",
            Category::KidneyCancer => "헬스/신장암",
            Category::AiAgents => "AI 에이전트",
            Category::TrendingWorks => "화제 작품",
        }
    }

    pub fn guidance(self) -> &'static str {
        match self {
            Category::WorldAffairs => "가장 중요한 국제 뉴스 1~2건과 그 영향",
            Category::UsStocks => "S&P 500, 나스닥 등 주요 지수 흐름과 움직임의 원인",
            Category::KidneyCancer => "신장암 신약, 임상시험, FDA 승인 등 최신 연구 소식",
            Category::AiAgents => "주요 AI 모델과 에이전트 제품의 새 버전 및 발표",
            Category::TrendingWorks => "박스오피스 1위 영화나 화제의 드라마/작품",
        }
    }
}

/// Instruction sent to the provider, kept structured until rendered.
#[derive(Debug, Clone)]
pub struct DigestPrompt {
    pub as_of: DateTime<Tz>,
    pub categories: Vec<Category>,
}

impl DigestPrompt {
    pub fn new(now: DateTime<Utc>) -> Self {
        DigestPrompt {
            as_of: now.with_timezone(&Seoul),
            categories: Category::ALL.to_vec(),
        }
    }

    /// Korean-style wall-clock time in Seoul, e.g. `2026년 10월 16일 오후 5:31`.
    pub fn as_of_label(&self) -> String {
        let meridiem = if self.as_of.format("%P").to_string() == "am" { "오전" } else { "오후" };
        format!(
            "{} {} {}",
            self.as_of.format("%Y년 %-m월 %-d일"),
            meridiem,
            self.as_of.format("%-I:%M"),
        )
    }

    pub fn render(&self) -> String {
        let mut result = String::with_capacity(1024);
        result.push_str(&format!(
            "현재 시각은 {} (한국 시간)입니다. 웹 검색으로 확인한 최신 정보만 사용해 아래 {}개 분야의 뉴스 요약을 한국어로 작성하세요.\n\n",
            self.as_of_label(),
            self.categories.len(),
        ));

        for (idx, category) in self.categories.iter().enumerate() {
            result.push_str(&format!("{}. {}: {}\n", idx + 1, category.label(), category.guidance()));
        }

        result.push_str(
            "\n형식 규칙:\n\
             - 인사말이나 서론 없이 바로 1번 항목으로 시작하세요.\n\
             - 마크다운 제목(#)이나 굵은 글씨를 쓰지 마세요.\n\
             - 각 항목은 \"번호. 분야명: \" 형식으로 시작하고 2~3문장으로 작성하세요.\n\
             - 전체 분량은 600~900자 사이로 맞추세요.\n\
             - 확인되지 않은 내용은 추측하지 말고 생략하세요.\n",
        );
        result
    }
}
