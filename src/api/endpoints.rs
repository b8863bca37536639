/// URL builder for the account API resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn sources(&self) -> String {
        format!("{}/api/source/", self.base_url)
    }

    pub fn channels(&self) -> String {
        format!("{}/api/channel/", self.base_url)
    }

    /// Report history of a channel; also the target for submitting readings
    pub fn channel_reports(&self, channel_id: i64) -> String {
        format!("{}/api/channel/{}/reports/", self.base_url, channel_id)
    }

    pub fn export_detail(&self, export_id: i64) -> String {
        format!("{}/api/export/{}/", self.base_url, export_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_resource_urls() {
        let e = Endpoints::new("https://account.waterius.ru/");
        assert_eq!(e.sources(), "https://account.waterius.ru/api/source/");
        assert_eq!(e.channels(), "https://account.waterius.ru/api/channel/");
        assert_eq!(
            e.channel_reports(12),
            "https://account.waterius.ru/api/channel/12/reports/"
        );
        assert_eq!(
            e.export_detail(7),
            "https://account.waterius.ru/api/export/7/"
        );
    }
}
